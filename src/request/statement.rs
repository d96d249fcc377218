//! SQL statements and transaction modes.

use super::value::Value;

/// Arguments attached to a statement.
///
/// Positional and named arguments are mutually exclusive by construction.
/// Named arguments are an order-preserving pair list; they reach the wire
/// in the order they were supplied.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Args {
    /// No arguments.
    #[default]
    None,
    /// Positional arguments, bound in call order.
    Positional(Vec<Value>),
    /// Named arguments, bound by parameter name.
    Named(Vec<(String, Value)>),
}

/// One SQL statement to execute through the pipeline.
///
/// # Example
///
/// ```
/// use libsql_http_client::{Statement, Value};
///
/// let plain: Statement = "SELECT 1".into();
/// let positional = Statement::with_args("SELECT * FROM users WHERE id = ?", [42]);
/// let named = Statement::with_named_args(
///     "SELECT * FROM users WHERE name = :name",
///     [(":name", Value::from("kit"))],
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    args: Args,
}

impl Statement {
    /// Create a statement without arguments.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Args::None,
        }
    }

    /// Create a statement with positional arguments.
    pub fn with_args<I, V>(sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            args: Args::Positional(args.into_iter().map(Into::into).collect()),
        }
    }

    /// Create a statement with named arguments, order-preserving.
    pub fn with_named_args<I, K, V>(sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            args: Args::Named(
                args.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// The SQL text.
    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The attached arguments.
    #[inline]
    pub fn args(&self) -> &Args {
        &self.args
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

/// Transaction mode for one pipeline call.
///
/// Maps 1:1 to a SQL `BEGIN` variant, or to no wrapping at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// No transaction wrapping.
    #[default]
    None,
    /// `BEGIN IMMEDIATE`.
    WriteImmediate,
    /// `BEGIN DEFERRED`.
    Deferred,
    /// `BEGIN TRANSACTION READONLY`.
    ReadOnly,
}

impl TransactionMode {
    /// The `BEGIN` statement opening this transaction, if any.
    pub fn begin_sql(self) -> Option<&'static str> {
        match self {
            TransactionMode::None => None,
            TransactionMode::WriteImmediate => Some("BEGIN IMMEDIATE"),
            TransactionMode::Deferred => Some("BEGIN DEFERRED"),
            TransactionMode::ReadOnly => Some("BEGIN TRANSACTION READONLY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_from_str() {
        let stmt: Statement = "SELECT 1".into();
        assert_eq!(stmt.sql(), "SELECT 1");
        assert_eq!(*stmt.args(), Args::None);
    }

    #[test]
    fn test_positional_args_keep_call_order() {
        let stmt = Statement::with_args("INSERT INTO t VALUES (?, ?)", [1i64, 2i64]);
        match stmt.args() {
            Args::Positional(values) => {
                assert_eq!(values, &[Value::Integer(1), Value::Integer(2)]);
            }
            other => panic!("expected positional args, got {other:?}"),
        }
    }

    #[test]
    fn test_named_args_keep_supplied_order() {
        let stmt = Statement::with_named_args(
            "INSERT INTO t VALUES (:b, :a)",
            [(":b", Value::Integer(2)), (":a", Value::Integer(1))],
        );
        match stmt.args() {
            Args::Named(pairs) => {
                assert_eq!(pairs[0].0, ":b");
                assert_eq!(pairs[1].0, ":a");
            }
            other => panic!("expected named args, got {other:?}"),
        }
    }

    #[test]
    fn test_begin_sql_mapping() {
        assert_eq!(TransactionMode::None.begin_sql(), None);
        assert_eq!(
            TransactionMode::WriteImmediate.begin_sql(),
            Some("BEGIN IMMEDIATE")
        );
        assert_eq!(TransactionMode::Deferred.begin_sql(), Some("BEGIN DEFERRED"));
        assert_eq!(
            TransactionMode::ReadOnly.begin_sql(),
            Some("BEGIN TRANSACTION READONLY")
        );
    }
}
