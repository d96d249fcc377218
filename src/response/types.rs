//! Decoded response records.

use std::fmt;

/// One server-side execution error, produced only by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code, when the server provides one.
    pub code: Option<String>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "({code}) {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Execution statistics for one statement that ran without error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionStats {
    /// Number of rows read.
    pub rows_read: u64,
    /// Number of rows affected by the statement.
    pub affected_rows: u64,
    /// Number of rows written.
    pub rows_written: u64,
    /// Query duration in milliseconds.
    pub query_duration_ms: f64,
    /// Rowid of the last inserted row, when the server provides one.
    pub last_insert_rowid: Option<String>,
    /// Replication index, when the server provides one.
    pub replication_index: Option<String>,
}

/// Byte-span of one normalized row inside the decoder's output buffer.
///
/// Deliberately an index + length rather than a slice: buffer growth can
/// relocate the backing storage, but indices into the committed prefix
/// stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowMarker {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display_with_code() {
        let error = ExecutionError {
            message: "no such table".to_string(),
            code: Some("SQLITE_ERROR".to_string()),
        };
        assert_eq!(error.to_string(), "(SQLITE_ERROR) no such table");
    }

    #[test]
    fn test_execution_error_display_without_code() {
        let error = ExecutionError {
            message: "interrupted".to_string(),
            code: None,
        };
        assert_eq!(error.to_string(), "interrupted");
    }
}
