//! Error types for libsql-http-client.

use std::fmt;

use thiserror::Error;

use crate::response::ExecutionError;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum LibSqlClientError {
    /// Transport-level failure while sending the pipeline request.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered the pipeline call with a non-success status code.
    #[error("pipeline request failed with status {status}: {body}")]
    Status {
        /// HTTP status code returned by the server.
        status: reqwest::StatusCode,
        /// Response body text, included for diagnostics.
        body: String,
    },

    /// JSON error while writing the request body or deserializing typed rows.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or truncated response body. The whole decode is aborted
    /// and no partial result is produced.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Buffer growth would exceed the maximum allocatable size.
    #[error("buffer capacity exceeded: requested {requested} bytes")]
    BufferCapacity {
        /// Total number of bytes the failed reservation asked for.
        requested: usize,
    },

    /// A pipeline call needs at least one statement.
    #[error("cannot serialize an empty statement list")]
    EmptyPipeline,

    /// Row-group index out of range (after normalizing negative indices).
    #[error("result index {index} out of range (count: {count})")]
    IndexOutOfRange {
        /// The index as given by the caller.
        index: isize,
        /// Number of row groups in the decoded result.
        count: usize,
    },

    /// The query completed but produced no rows.
    #[error("query returned no rows")]
    NoRows,

    /// Invalid client configuration (bad database URL).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// One or more statements were rejected by the server.
    #[error(transparent)]
    Execution(#[from] ExecutionErrors),
}

/// Result type alias using [`LibSqlClientError`].
pub type Result<T> = std::result::Result<T, LibSqlClientError>;

/// Ordered list of server-side execution errors from one pipeline call.
///
/// Produced by `ResultReader::check_errors` when the decoded response
/// carried at least one `error` entry. The list preserves response order,
/// so the first element is the first statement that failed.
#[derive(Debug, Clone)]
pub struct ExecutionErrors(Vec<ExecutionError>);

impl ExecutionErrors {
    pub(crate) fn new(errors: Vec<ExecutionError>) -> Self {
        Self(errors)
    }

    /// All errors, in response order.
    pub fn errors(&self) -> &[ExecutionError] {
        &self.0
    }

    /// The first error, for the common single-failure case.
    pub fn first(&self) -> Option<&ExecutionError> {
        self.0.first()
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExecutionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline execution failed")?;
        for (index, error) in self.0.iter().enumerate() {
            write!(f, "\n\t[{index}]: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionErrors {}
