//! Response decoding - streaming tokenizer, decoder, and result reader.
//!
//! [`parse`] runs a single forward pass over the response body and
//! produces a [`ResultReader`]: row groups stored as normalized JSON
//! fragments in a pooled buffer, execution statistics, and execution
//! errors. Typed deserialization is deferred until the caller asks for a
//! specific result set.

mod decoder;
mod reader;
mod tokenizer;
mod types;

pub use decoder::parse;
pub use reader::{ResultReader, Rows, ScalarValue};
pub use types::{ExecutionError, ExecutionStats};
