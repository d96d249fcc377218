//! # libsql-http-client
//!
//! Client-side codec and HTTP facade for the libsql pipeline protocol
//! (`POST /v3/pipeline`): execute SQL over HTTP against a remote
//! embedded-database server.
//!
//! ## Architecture
//!
//! - **Request encoder** ([`request`]): statements + transaction mode →
//!   the exact pipeline JSON body, with transaction-control steps and
//!   per-statement step conditions synthesized on the way out
//! - **Response decoder** ([`response`]): a single-pass pull tokenizer
//!   turns the response into normalized per-row JSON fragments in a pooled
//!   buffer, addressed by offset/length markers
//! - **Result reader** ([`ResultReader`]): forward-only cursor with lazy
//!   typed deserialization, deferred until a result set is asked for
//! - **Buffer** ([`buffer`]): the growable pooled byte sink both codec
//!   halves share
//! - **Facade** ([`LibSqlHttpClient`]): transport, auth header, and
//!   status-code mapping on top of the codec
//!
//! ## Example
//!
//! ```ignore
//! use libsql_http_client::{LibSqlHttpClient, Statement, TransactionMode};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LibSqlHttpClient::new(
//!         reqwest::Client::new(),
//!         "https://db.example.com".parse()?,
//!         Some("YOUR_AUTH_TOKEN"),
//!     )?;
//!
//!     let users: Vec<User> = client
//!         .query(
//!             Statement::with_args("SELECT id, name FROM users WHERE id = ?", [42]),
//!             TransactionMode::None,
//!         )
//!         .await?;
//!
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod error;
pub mod request;
pub mod response;

mod client;

pub use client::LibSqlHttpClient;
pub use error::{ExecutionErrors, LibSqlClientError, Result};
pub use request::{serialize, Args, SerializedRequest, Statement, TransactionMode, Value};
pub use response::{parse, ExecutionError, ExecutionStats, ResultReader, Rows, ScalarValue};
