//! High-level HTTP facade over the pipeline codec.
//!
//! [`LibSqlHttpClient`] owns the transport concerns: the shared
//! `reqwest::Client`, the resolved `/v3/pipeline` endpoint, the
//! authorization header, and the mapping of non-success status codes to
//! errors. Every call serializes through the request encoder, POSTs,
//! decodes through the response decoder with the synthetic transaction
//! steps filtered out, and checks execution errors before handing results
//! back.
//!
//! # Example
//!
//! ```ignore
//! use libsql_http_client::{LibSqlHttpClient, Statement, TransactionMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LibSqlHttpClient::new(
//!         reqwest::Client::new(),
//!         "https://db.example.com".parse()?,
//!         Some("YOUR_AUTH_TOKEN"),
//!     )?;
//!
//!     let affected = client
//!         .execute("CREATE TABLE users (id INTEGER, name TEXT)", TransactionMode::None)
//!         .await?;
//!     println!("affected: {affected}");
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;

use reqwest::header;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::error::{LibSqlClientError, Result};
use crate::request::{serialize, Statement, TransactionMode};
use crate::response::{parse, ResultReader, ScalarValue};

/// Pipeline endpoint path, resolved against the database URL.
const PIPELINE_V3_PATH: &str = "/v3/pipeline";

/// HTTP client for the libsql pipeline endpoint.
///
/// Cloning is cheap (the underlying `reqwest::Client` is shared); use
/// [`LibSqlHttpClient::with_credentials`] to re-target another database
/// with the same connection pool.
#[derive(Clone)]
pub struct LibSqlHttpClient {
    http: reqwest::Client,
    pipeline_url: Url,
    auth_header: Option<String>,
}

impl LibSqlHttpClient {
    /// Create a client for the database at `url`.
    ///
    /// A provided `auth_token` is sent as `Authorization: Bearer <token>`;
    /// an existing `Bearer ` prefix on the token is stripped first.
    ///
    /// # Errors
    ///
    /// Returns [`LibSqlClientError::Config`] when the pipeline endpoint
    /// cannot be resolved against `url`.
    pub fn new(http: reqwest::Client, url: Url, auth_token: Option<&str>) -> Result<Self> {
        let pipeline_url = url
            .join(PIPELINE_V3_PATH)
            .map_err(|e| LibSqlClientError::Config(format!("invalid database URL: {e}")))?;

        let auth_header = auth_token.map(|token| format!("Bearer {}", token.replace("Bearer ", "")));

        Ok(Self {
            http,
            pipeline_url,
            auth_header,
        })
    }

    /// A new client against another database, reusing this client's
    /// transport.
    pub fn with_credentials(&self, url: Url, auth_token: Option<&str>) -> Result<Self> {
        Self::new(self.http.clone(), url, auth_token)
    }

    /// Execute a single statement and return the number of affected rows.
    pub async fn execute(
        &self,
        statement: impl Into<Statement>,
        mode: TransactionMode,
    ) -> Result<u64> {
        self.execute_multiple(&[statement.into()], mode).await
    }

    /// Execute several statements and return the total number of affected
    /// rows.
    pub async fn execute_multiple(
        &self,
        statements: &[Statement],
        mode: TransactionMode,
    ) -> Result<u64> {
        let reader = self.send_pipeline(statements, mode).await?;
        reader.check_errors()?;
        Ok(reader.affected_rows())
    }

    /// Execute a single statement and return the first column of its first
    /// row, if any.
    pub async fn execute_scalar(
        &self,
        statement: impl Into<Statement>,
        mode: TransactionMode,
    ) -> Result<Option<ScalarValue>> {
        let reader = self.send_pipeline(&[statement.into()], mode).await?;
        reader.check_errors()?;
        Ok(reader.scalar_value())
    }

    /// Query a single statement and deserialize every row.
    pub async fn query<T: DeserializeOwned>(
        &self,
        statement: impl Into<Statement>,
        mode: TransactionMode,
    ) -> Result<Vec<T>> {
        let reader = self.send_pipeline(&[statement.into()], mode).await?;
        reader.check_errors()?;

        if reader.count() == 0 {
            return Ok(Vec::new());
        }
        reader.read_at(0)?.collect()
    }

    /// Query a single statement and deserialize the first row.
    ///
    /// # Errors
    ///
    /// Returns [`LibSqlClientError::NoRows`] when the result is empty.
    pub async fn query_first<T: DeserializeOwned>(
        &self,
        statement: impl Into<Statement>,
        mode: TransactionMode,
    ) -> Result<T> {
        self.query_first_optional(statement, mode)
            .await?
            .ok_or(LibSqlClientError::NoRows)
    }

    /// Query a single statement and deserialize the first row, if any.
    pub async fn query_first_optional<T: DeserializeOwned>(
        &self,
        statement: impl Into<Statement>,
        mode: TransactionMode,
    ) -> Result<Option<T>> {
        let reader = self.send_pipeline(&[statement.into()], mode).await?;
        reader.check_errors()?;

        if reader.count() == 0 {
            return Ok(None);
        }
        reader.read_at(0)?.next().transpose()
    }

    /// Execute several statements and hand back the full reader for
    /// result-set-by-result-set consumption.
    pub async fn query_multiple(
        &self,
        statements: &[Statement],
        mode: TransactionMode,
    ) -> Result<ResultReader> {
        let reader = self.send_pipeline(statements, mode).await?;
        reader.check_errors()?;
        Ok(reader)
    }

    async fn send_pipeline(
        &self,
        statements: &[Statement],
        mode: TransactionMode,
    ) -> Result<ResultReader> {
        let request = serialize(statements, mode, None, false)?;

        tracing::debug!(
            statements = statements.len(),
            bytes = request.body.len(),
            "sending pipeline request"
        );

        let mut builder = self
            .http
            .post(self.pipeline_url.clone())
            .header(header::CONTENT_TYPE, request.content_type)
            .body(request.body);
        if let Some(auth) = &self.auth_header {
            builder = builder.header(header::AUTHORIZATION, auth.as_str());
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "pipeline request rejected");
            return Err(LibSqlClientError::Status { status, body });
        }

        let body = response.bytes().await?;
        let ignored = ignored_step_indices(statements.len(), mode);
        parse(&body, &ignored)
    }
}

/// Step indices the decoder should discard: the synthetic BEGIN (0),
/// COMMIT (N+1), and ROLLBACK (N+2) steps injected around N statements
/// when a transaction mode is active.
fn ignored_step_indices(statement_count: usize, mode: TransactionMode) -> HashSet<usize> {
    match mode {
        TransactionMode::None => HashSet::new(),
        _ => HashSet::from([0, statement_count + 1, statement_count + 2]),
    }
}
