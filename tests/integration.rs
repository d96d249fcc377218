//! Integration tests for libsql-http-client.
//!
//! These tests drive the codec end to end: serialize a pipeline call the
//! way the facade would, then decode a matching server response and read
//! it back through the public reader API.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::json;

use libsql_http_client::{
    parse, serialize, LibSqlClientError, LibSqlHttpClient, ScalarValue, Statement,
    TransactionMode, Value,
};

fn request_json(statements: &[Statement], mode: TransactionMode) -> serde_json::Value {
    let request = serialize(statements, mode, None, false).unwrap();
    serde_json::from_slice(&request.body).unwrap()
}

/// Scenario: `SELECT 1` without a transaction.
///
/// The request is one `execute` plus a trailing `close`; the response
/// yields one single-row group, zero affected rows, and scalar 1.
#[test]
fn test_select_one_round_trip() {
    let body = request_json(&["SELECT 1".into()], TransactionMode::None);

    assert_eq!(
        body,
        json!({
            "requests": [
                {"type": "execute", "stmt": {"sql": "SELECT 1"}},
                {"type": "close"}
            ]
        })
    );

    let response = br#"{"baton":null,"results":[
        {"type":"execute","response":{"result":{
            "cols":[{"name":"1"}],
            "rows":[[{"type":"integer","value":"1"}]],
            "affected_row_count":0,"rows_read":1,"rows_written":0,
            "query_duration_ms":0.1}}},
        {"type":"close"}]}"#;

    let mut reader = parse(response, &HashSet::new()).unwrap();
    reader.check_errors().unwrap();

    assert_eq!(reader.count(), 1);
    assert_eq!(reader.affected_rows(), 0);
    assert_eq!(reader.scalar_value(), Some(ScalarValue::Integer(1)));

    assert!(reader.has_more_results());
    let rows: Vec<serde_json::Value> = reader
        .read()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows, vec![json!({"1": 1})]);
    assert!(!reader.has_more_results());
}

/// Scenario: two statements under `WriteImmediate`, the second one fails.
///
/// The encoded batch is exactly BEGIN / stmt / stmt / COMMIT / ROLLBACK;
/// decoding with the synthetic steps ignored yields one error and a row
/// group per user statement.
#[test]
fn test_transaction_with_failing_statement() {
    let statements = [
        Statement::new("INSERT INTO t VALUES (1)"),
        Statement::new("INSERT INTO nope VALUES (2)"),
    ];
    let body = request_json(&statements, TransactionMode::WriteImmediate);

    assert_eq!(
        body,
        json!({
            "requests": [
                {"type": "batch", "batch": {"steps": [
                    {"stmt": {"sql": "BEGIN IMMEDIATE"}},
                    {"stmt": {"sql": "INSERT INTO t VALUES (1)"},
                     "condition": {"type": "ok", "step": 0}},
                    {"stmt": {"sql": "INSERT INTO nope VALUES (2)"},
                     "condition": {"type": "ok", "step": 1}},
                    {"stmt": {"sql": "COMMIT"},
                     "condition": {"type": "ok", "step": 2}},
                    {"stmt": {"sql": "ROLLBACK"},
                     "condition": {"type": "not", "cond": {"type": "ok", "step": 3}}}
                ]}},
                {"type": "close"}
            ]
        })
    );

    // Steps 0..=4; statement at step 2 errored, so COMMIT's condition
    // failed (null) and ROLLBACK ran.
    let response = br#"{"results":[
        {"type":"batch","response":{"result":{
            "step_results":[
                {"cols":[],"rows":[],"affected_row_count":0},
                {"cols":[],"rows":[],"affected_row_count":1},
                null,
                null,
                {"cols":[],"rows":[],"affected_row_count":0}],
            "step_errors":[
                null,
                null,
                {"message":"no such table: nope","code":"SQLITE_ERROR"},
                null,
                null]}}},
        {"type":"close"}]}"#;

    let ignored: HashSet<usize> = [0, 3, 4].into_iter().collect();
    let reader = parse(response, &ignored).unwrap();

    // One kept group per user statement: step 1's result and step 2's null.
    assert_eq!(reader.count(), 2);

    match reader.check_errors() {
        Err(LibSqlClientError::Execution(errors)) => {
            assert_eq!(errors.len(), 1);
            let error = errors.first().unwrap();
            assert_eq!(error.message, "no such table: nope");
            assert_eq!(error.code.as_deref(), Some("SQLITE_ERROR"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

/// A 64-bit integer survives the full trip exactly: encoded as decimal
/// text, decoded back from the same text, with no float rounding.
#[test]
fn test_i64_round_trip_is_exact() {
    // 2^53 + 1 is not representable as an f64.
    let value = 9_007_199_254_740_993i64;

    let request = serialize(
        &[Statement::with_args("INSERT INTO t VALUES (?)", [value])],
        TransactionMode::None,
        None,
        false,
    )
    .unwrap();

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        body["requests"][0]["stmt"]["args"][0],
        json!({"type": "integer", "value": "9007199254740993"})
    );

    let response = br#"{"results":[{"type":"execute","response":{"result":{
        "cols":[{"name":"n"}],
        "rows":[[{"type":"integer","value":"9007199254740993"}]]}}}]}"#;

    #[derive(Deserialize)]
    struct Row {
        n: i64,
    }

    let reader = parse(response, &HashSet::new()).unwrap();
    let rows: Vec<Row> = reader
        .read_at(0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows[0].n, value);

    assert_eq!(reader.scalar_value(), Some(ScalarValue::Integer(value)));
}

/// Batch responses interleave executed, skipped, and errored steps; the
/// reader walks kept groups in order.
#[test]
fn test_multi_result_cursor_walk() {
    let response = br#"{"results":[
        {"type":"execute","response":{"result":{
            "cols":[{"name":"a"}],
            "rows":[[{"type":"integer","value":"1"}],[{"type":"integer","value":"2"}]],
            "affected_row_count":0}}},
        {"type":"execute","response":{"result":{
            "cols":[{"name":"a"}],
            "rows":[],
            "affected_row_count":4}}}]}"#;

    let mut reader = parse(response, &HashSet::new()).unwrap();

    assert_eq!(reader.count(), 2);
    assert_eq!(reader.affected_rows(), 4);

    let mut group_sizes = Vec::new();
    while reader.has_more_results() {
        let rows: Vec<serde_json::Value> = reader
            .read()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        group_sizes.push(rows.len());
    }
    assert_eq!(group_sizes, vec![2, 0]);

    // read_at(-1) is the last group.
    let last: Vec<serde_json::Value> = reader
        .read_at(-1)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(last.is_empty());

    assert!(matches!(
        reader.read_at::<serde_json::Value>(2),
        Err(LibSqlClientError::IndexOutOfRange { .. })
    ));
}

/// Blob arguments and blob cells travel as base64 text both ways.
#[test]
fn test_blob_round_trip() {
    let request = serialize(
        &[Statement::with_args(
            "INSERT INTO files VALUES (?)",
            [Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF])],
        )],
        TransactionMode::None,
        None,
        false,
    )
    .unwrap();

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        body["requests"][0]["stmt"]["args"][0],
        json!({"type": "blob", "base64": "3q2+7w=="})
    );

    let response = br#"{"results":[{"type":"execute","response":{"result":{
        "cols":[{"name":"data"}],
        "rows":[[{"type":"blob","base64":"3q2+7w=="}]]}}}]}"#;

    let reader = parse(response, &HashSet::new()).unwrap();
    assert_eq!(
        reader.scalar_value(),
        Some(ScalarValue::Text("3q2+7w==".to_string()))
    );
}

/// A connection failure surfaces as a transport error, not a panic and
/// not a decode error.
#[tokio::test]
async fn test_transport_failure_surfaces_as_http_error() {
    // Port 1 is never listening.
    let client = LibSqlHttpClient::new(
        reqwest::Client::new(),
        "http://127.0.0.1:1".parse().unwrap(),
        None,
    )
    .unwrap();

    let result = client.execute("SELECT 1", TransactionMode::None).await;
    assert!(matches!(result, Err(LibSqlClientError::Http(_))));
}

/// A baton in the response is captured for interactive continuation, and
/// feeding it back into `serialize` lands in the body head.
#[test]
fn test_baton_flows_through() {
    let response = br#"{"baton":"s-123","results":[]}"#;
    let reader = parse(response, &HashSet::new()).unwrap();
    assert_eq!(reader.baton(), Some("s-123"));

    let request = serialize(
        &[Statement::new("SELECT 1")],
        TransactionMode::None,
        reader.baton(),
        true,
    )
    .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["baton"], "s-123");
}
