//! Pipeline request body serialization.
//!
//! One pipeline call carries either a single `execute` request (the
//! single-statement fast path) or a `batch` request whose steps chain
//! through server-evaluated conditions. When a transaction mode is active
//! the serializer synthesizes the surrounding control steps:
//!
//! ```text
//! step 0        BEGIN <mode>                 (no condition)
//! steps 1..=N   user statements              (ok on previous step)
//! step N+1      COMMIT                       (ok on step N)
//! step N+2      ROLLBACK                     (not(ok(step N+1)))
//! ```
//!
//! Non-interactive calls additionally append a `close` request telling the
//! server to end the pipeline session.

use bytes::Bytes;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::statement::{Args, Statement, TransactionMode};
use super::value::Value;
use crate::buffer::{PooledBufWriter, MIN_BUFFER_SIZE};
use crate::error::{LibSqlClientError, Result};

/// Content type of every serialized pipeline request.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A serialized pipeline request, ready for an HTTP POST.
#[derive(Debug, Clone)]
pub struct SerializedRequest {
    /// Request body bytes.
    pub body: Bytes,
    /// Content type to send with the body.
    pub content_type: &'static str,
}

#[derive(serde::Serialize)]
struct PipelineRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    baton: Option<&'a str>,
    requests: Vec<PipelineRequest<'a>>,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineRequest<'a> {
    Execute { stmt: StmtBody<'a> },
    Batch { batch: BatchBody<'a> },
    Close,
}

#[derive(serde::Serialize)]
struct BatchBody<'a> {
    steps: Vec<BatchStep<'a>>,
}

#[derive(serde::Serialize)]
struct BatchStep<'a> {
    stmt: StmtBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<StepCondition>,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StepCondition {
    Ok { step: usize },
    Not { cond: Box<StepCondition> },
}

#[derive(serde::Serialize)]
struct StmtBody<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    named_args: Option<Vec<NamedArg<'a>>>,
}

struct NamedArg<'a> {
    name: &'a str,
    value: &'a Value,
}

impl Serialize for NamedArg<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NamedArg", 2)?;
        s.serialize_field("name", self.name)?;
        s.serialize_field("value", self.value)?;
        s.end()
    }
}

impl<'a> StmtBody<'a> {
    /// A bare statement with no arguments (used for synthesized control steps).
    fn raw(sql: &'a str) -> Self {
        Self {
            sql,
            args: None,
            named_args: None,
        }
    }

    fn from_statement(stmt: &'a Statement) -> Self {
        match stmt.args() {
            Args::None => Self::raw(stmt.sql()),
            Args::Positional(values) if values.is_empty() => Self::raw(stmt.sql()),
            Args::Positional(values) => Self {
                sql: stmt.sql(),
                args: Some(values),
                named_args: None,
            },
            Args::Named(pairs) if pairs.is_empty() => Self::raw(stmt.sql()),
            Args::Named(pairs) => Self {
                sql: stmt.sql(),
                args: None,
                named_args: Some(
                    pairs
                        .iter()
                        .map(|(name, value)| NamedArg { name, value })
                        .collect(),
                ),
            },
        }
    }
}

/// Serialize one pipeline call.
///
/// `baton` continues a server-side session from a previous call.
/// `interactive` keeps the pipeline session open: no `close` request is
/// appended and an active transaction is left uncommitted for a follow-up
/// call.
///
/// # Errors
///
/// Returns [`LibSqlClientError::EmptyPipeline`] for an empty statement
/// list.
pub fn serialize(
    statements: &[Statement],
    mode: TransactionMode,
    baton: Option<&str>,
    interactive: bool,
) -> Result<SerializedRequest> {
    if statements.is_empty() {
        return Err(LibSqlClientError::EmptyPipeline);
    }

    let mut requests = Vec::with_capacity(2);

    if statements.len() == 1 && mode == TransactionMode::None {
        requests.push(PipelineRequest::Execute {
            stmt: StmtBody::from_statement(&statements[0]),
        });
    } else {
        requests.push(PipelineRequest::Batch {
            batch: BatchBody {
                steps: build_steps(statements, mode, interactive),
            },
        });
    }

    if !interactive {
        requests.push(PipelineRequest::Close);
    }

    let body = PipelineRequestBody { baton, requests };

    let mut buf = PooledBufWriter::acquire(MIN_BUFFER_SIZE);
    serde_json::to_writer(&mut buf, &body)?;

    Ok(SerializedRequest {
        body: Bytes::copy_from_slice(buf.written_span()),
        content_type: CONTENT_TYPE_JSON,
    })
}

fn build_steps<'a>(
    statements: &'a [Statement],
    mode: TransactionMode,
    interactive: bool,
) -> Vec<BatchStep<'a>> {
    let mut steps = Vec::with_capacity(statements.len() + 3);

    // Index of the step the next statement's condition points at.
    let mut previous: Option<usize> = None;

    if let Some(begin) = mode.begin_sql() {
        steps.push(BatchStep {
            stmt: StmtBody::raw(begin),
            condition: None,
        });
        previous = Some(0);
    }

    for stmt in statements {
        let condition = previous.map(|step| StepCondition::Ok { step });
        steps.push(BatchStep {
            stmt: StmtBody::from_statement(stmt),
            condition,
        });
        previous = Some(steps.len() - 1);
    }

    if mode != TransactionMode::None && !interactive {
        let last = steps.len() - 1;
        steps.push(BatchStep {
            stmt: StmtBody::raw("COMMIT"),
            condition: Some(StepCondition::Ok { step: last }),
        });
        steps.push(BatchStep {
            stmt: StmtBody::raw("ROLLBACK"),
            condition: Some(StepCondition::Not {
                cond: Box::new(StepCondition::Ok { step: last + 1 }),
            }),
        });
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_str(request: &SerializedRequest) -> String {
        String::from_utf8(request.body.to_vec()).unwrap()
    }

    #[test]
    fn test_single_statement_uses_execute_fast_path() {
        let request = serialize(
            &[Statement::new("SELECT 1")],
            TransactionMode::None,
            None,
            false,
        )
        .unwrap();

        assert_eq!(request.content_type, CONTENT_TYPE_JSON);
        assert_eq!(
            body_str(&request),
            r#"{"requests":[{"type":"execute","stmt":{"sql":"SELECT 1"}},{"type":"close"}]}"#
        );
    }

    #[test]
    fn test_interactive_call_omits_close() {
        let request = serialize(
            &[Statement::new("SELECT 1")],
            TransactionMode::None,
            None,
            true,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            r#"{"requests":[{"type":"execute","stmt":{"sql":"SELECT 1"}}]}"#
        );
    }

    #[test]
    fn test_baton_written_first() {
        let request = serialize(
            &[Statement::new("SELECT 1")],
            TransactionMode::None,
            Some("session-token"),
            true,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            r#"{"baton":"session-token","requests":[{"type":"execute","stmt":{"sql":"SELECT 1"}}]}"#
        );
    }

    #[test]
    fn test_multiple_statements_use_batch_without_mode() {
        let request = serialize(
            &[Statement::new("SELECT 1"), Statement::new("SELECT 2")],
            TransactionMode::None,
            None,
            false,
        )
        .unwrap();

        // No BEGIN step, but statements still chain on the previous step.
        assert_eq!(
            body_str(&request),
            concat!(
                r#"{"requests":[{"type":"batch","batch":{"steps":["#,
                r#"{"stmt":{"sql":"SELECT 1"}},"#,
                r#"{"stmt":{"sql":"SELECT 2"},"condition":{"type":"ok","step":0}}"#,
                r#"]}},{"type":"close"}]}"#
            )
        );
    }

    #[test]
    fn test_transaction_synthesizes_begin_commit_rollback() {
        let request = serialize(
            &[
                Statement::new("INSERT INTO t VALUES (1)"),
                Statement::new("INSERT INTO t VALUES (2)"),
            ],
            TransactionMode::WriteImmediate,
            None,
            false,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            concat!(
                r#"{"requests":[{"type":"batch","batch":{"steps":["#,
                r#"{"stmt":{"sql":"BEGIN IMMEDIATE"}},"#,
                r#"{"stmt":{"sql":"INSERT INTO t VALUES (1)"},"condition":{"type":"ok","step":0}},"#,
                r#"{"stmt":{"sql":"INSERT INTO t VALUES (2)"},"condition":{"type":"ok","step":1}},"#,
                r#"{"stmt":{"sql":"COMMIT"},"condition":{"type":"ok","step":2}},"#,
                r#"{"stmt":{"sql":"ROLLBACK"},"condition":{"type":"not","cond":{"type":"ok","step":3}}}"#,
                r#"]}},{"type":"close"}]}"#
            )
        );
    }

    #[test]
    fn test_single_statement_with_mode_still_batches() {
        let request = serialize(
            &[Statement::new("DELETE FROM t")],
            TransactionMode::Deferred,
            None,
            false,
        )
        .unwrap();

        let text = body_str(&request);
        assert!(text.contains(r#""type":"batch""#));
        assert!(text.contains(r#""sql":"BEGIN DEFERRED""#));
        assert!(text.contains(r#""sql":"COMMIT""#));
        assert!(text.contains(r#""sql":"ROLLBACK""#));
    }

    #[test]
    fn test_interactive_transaction_omits_commit_and_rollback() {
        let request = serialize(
            &[Statement::new("INSERT INTO t VALUES (1)")],
            TransactionMode::WriteImmediate,
            Some("tok"),
            true,
        )
        .unwrap();

        let text = body_str(&request);
        assert!(text.starts_with(r#"{"baton":"tok""#));
        assert!(text.contains(r#""sql":"BEGIN IMMEDIATE""#));
        assert!(!text.contains("COMMIT"));
        assert!(!text.contains("ROLLBACK"));
        assert!(!text.contains(r#""type":"close""#));
    }

    #[test]
    fn test_positional_args_serialized_in_order() {
        let request = serialize(
            &[Statement::with_args(
                "INSERT INTO t VALUES (?, ?, ?)",
                [Value::Null, Value::Integer(7), Value::from("x")],
            )],
            TransactionMode::None,
            None,
            true,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            concat!(
                r#"{"requests":[{"type":"execute","stmt":{"sql":"INSERT INTO t VALUES (?, ?, ?)","#,
                r#""args":[{"type":"null"},{"type":"integer","value":"7"},{"type":"text","value":"x"}]}}]}"#
            )
        );
    }

    #[test]
    fn test_named_args_serialized_as_pairs() {
        let request = serialize(
            &[Statement::with_named_args(
                "SELECT * FROM t WHERE a = :a",
                [(":a", Value::Integer(1))],
            )],
            TransactionMode::None,
            None,
            true,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            concat!(
                r#"{"requests":[{"type":"execute","stmt":{"sql":"SELECT * FROM t WHERE a = :a","#,
                r#""named_args":[{"name":":a","value":{"type":"integer","value":"1"}}]}}]}"#
            )
        );
    }

    #[test]
    fn test_empty_args_are_omitted() {
        let request = serialize(
            &[Statement::with_args("SELECT 1", Vec::<Value>::new())],
            TransactionMode::None,
            None,
            true,
        )
        .unwrap();

        assert_eq!(
            body_str(&request),
            r#"{"requests":[{"type":"execute","stmt":{"sql":"SELECT 1"}}]}"#
        );
    }

    #[test]
    fn test_empty_statement_list_is_rejected() {
        let result = serialize(&[], TransactionMode::None, None, false);
        assert!(matches!(result, Err(LibSqlClientError::EmptyPipeline)));
    }
}
