//! Request encoding - statements, argument values, and the pipeline
//! serializer.
//!
//! The encoder consumes an ordered list of [`Statement`]s plus a
//! [`TransactionMode`] and produces the exact JSON body for one pipeline
//! call, synthesizing transaction-control steps and per-statement step
//! conditions. See [`serialize`] for the entry point.

mod serializer;
mod statement;
mod value;

pub use serializer::{serialize, SerializedRequest, CONTENT_TYPE_JSON};
pub use statement::{Args, Statement, TransactionMode};
pub use value::Value;
