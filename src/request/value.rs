//! Argument values for SQL statements.
//!
//! [`Value`] is the closed set of types the pipeline protocol can carry as
//! statement arguments. Integers travel as decimal strings because 64-bit
//! values are not safely round-trippable as native JSON numbers, and
//! booleans are coerced to integer 0/1 before encoding; they are not a
//! wire tag.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// A single statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer, transmitted as decimal text.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, transmitted base64-encoded.
    Blob(Vec<u8>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => {
                let mut s = serializer.serialize_struct("Value", 1)?;
                s.serialize_field("type", "null")?;
                s.end()
            }
            Value::Blob(bytes) => {
                let mut s = serializer.serialize_struct("Value", 2)?;
                s.serialize_field("type", "blob")?;
                s.serialize_field("base64", &BASE64.encode(bytes))?;
                s.end()
            }
            Value::Integer(v) => {
                let mut s = serializer.serialize_struct("Value", 2)?;
                s.serialize_field("type", "integer")?;
                s.serialize_field("value", &v.to_string())?;
                s.end()
            }
            Value::Float(v) => {
                let mut s = serializer.serialize_struct("Value", 2)?;
                s.serialize_field("type", "float")?;
                s.serialize_field("value", v)?;
                s.end()
            }
            Value::Text(v) => {
                let mut s = serializer.serialize_struct("Value", 2)?;
                s.serialize_field("type", "text")?;
                s.serialize_field("value", v)?;
                s.end()
            }
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(v as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(if v { 1 } else { 0 })
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
