//! Streaming decoder for pipeline response bodies.
//!
//! One forward pass over the tokenizer turns a response into:
//! - the continuation token (`baton`), if present
//! - one row group per executed statement, each row stored as a flat
//!   normalized JSON object (`{"col": value, ...}`) in the pooled buffer
//!   and addressed by an offset/length marker
//! - one [`ExecutionStats`] record per statement that produced a result
//! - the ordered list of [`ExecutionError`]s
//!
//! The ignore set lets the caller discard the synthetic
//! `BEGIN`/`COMMIT`/`ROLLBACK` step results the serializer injected, so
//! callers only ever see results for the statements they supplied.
//!
//! Normalization per cell is driven by the cell's own `type` tag:
//! `null` becomes a JSON null, `integer` is reparsed from its decimal text
//! into a 64-bit value (null when the reparse fails), `float` is copied as
//! a number, `blob` re-emits the base64 payload as a string, and anything
//! else is copied as a string with its escapes intact.

use std::collections::HashSet;

use crate::buffer::PooledBufWriter;
use crate::error::{LibSqlClientError, Result};

use super::reader::ResultReader;
use super::tokenizer::{unescape, JsonTokenizer, Token};
use super::types::{ExecutionError, ExecutionStats, RowMarker};

/// Decode a complete pipeline response body.
///
/// `ignored_steps` holds the zero-based `step_results` indices to discard
/// (the synthetic transaction steps). Malformed or truncated input aborts
/// the whole decode; the pooled buffer is released on every exit path.
pub fn parse(body: &[u8], ignored_steps: &HashSet<usize>) -> Result<ResultReader> {
    let mut decoder = Decoder {
        tok: JsonTokenizer::new(body),
        buf: PooledBufWriter::acquire(body.len()),
        ignored_steps,
        baton: None,
        errors: Vec::new(),
        stats: Vec::new(),
        row_groups: Vec::new(),
    };

    decoder.run()?;

    tracing::trace!(
        groups = decoder.row_groups.len(),
        errors = decoder.errors.len(),
        "decoded pipeline response"
    );

    Ok(ResultReader::new(
        decoder.buf,
        decoder.baton,
        decoder.errors,
        decoder.stats,
        decoder.row_groups,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Error,
    Execute,
    Batch,
    Other,
}

/// Collected fields of one row cell. Tokens borrow the response body, so
/// collecting them first makes the decoder independent of field order
/// within the cell.
struct Cell<'a> {
    type_tag: Option<&'a [u8]>,
    value: Option<Token<'a>>,
    base64: Option<&'a [u8]>,
}

struct Decoder<'a> {
    tok: JsonTokenizer<'a>,
    buf: PooledBufWriter,
    ignored_steps: &'a HashSet<usize>,
    baton: Option<String>,
    errors: Vec<ExecutionError>,
    stats: Vec<ExecutionStats>,
    row_groups: Vec<Vec<RowMarker>>,
}

impl<'a> Decoder<'a> {
    fn run(&mut self) -> Result<()> {
        match self.tok.next_token()? {
            Some(Token::ObjectStart) => {}
            _ => return Err(parse_err("expected top-level object")),
        }

        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => break,
                Some(Token::Key(key)) => match key {
                    b"baton" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => self.baton = Some(unescape(raw)?.into_owned()),
                        Some(Token::Null) => {}
                        _ => return Err(parse_err("baton must be a string")),
                    },
                    b"results" => self.parse_results()?,
                    _ => self.tok.skip_value()?,
                },
                _ => return Err(parse_err("malformed response object")),
            }
        }

        Ok(())
    }

    fn parse_results(&mut self) -> Result<()> {
        self.expect_array_start("results")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ArrayEnd) => return Ok(()),
                Some(Token::ObjectStart) => self.parse_result_entry()?,
                _ => return Err(parse_err("expected result entry object")),
            }
        }
    }

    /// One entry of the `results` array. The entry's `type` tag must
    /// precede its payload field; dispatch is impossible otherwise in a
    /// single pass.
    fn parse_result_entry(&mut self) -> Result<()> {
        let mut kind: Option<EntryKind> = None;

        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => return Ok(()),
                Some(Token::Key(key)) => match key {
                    b"type" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => {
                            kind = Some(match raw {
                                b"error" => EntryKind::Error,
                                b"execute" => EntryKind::Execute,
                                b"batch" => EntryKind::Batch,
                                _ => EntryKind::Other,
                            });
                        }
                        _ => return Err(parse_err("result entry type must be a string")),
                    },
                    b"error" => self.parse_error_value()?,
                    b"response" => match kind {
                        Some(EntryKind::Execute) => self.parse_execute_response()?,
                        Some(EntryKind::Batch) => self.parse_batch_response()?,
                        Some(EntryKind::Error) | Some(EntryKind::Other) => {
                            self.tok.skip_value()?
                        }
                        None => {
                            return Err(parse_err(
                                "result entry carries a response before its type tag",
                            ))
                        }
                    },
                    _ => self.tok.skip_value()?,
                },
                _ => return Err(parse_err("malformed result entry")),
            }
        }
    }

    /// An error value: `null` (skipped) or an error object.
    fn parse_error_value(&mut self) -> Result<()> {
        match self.tok.next_token()? {
            Some(Token::Null) => Ok(()),
            Some(Token::ObjectStart) => {
                if let Some(error) = self.parse_error_object()? {
                    self.errors.push(error);
                }
                Ok(())
            }
            _ => Err(parse_err("error entry must be null or an object")),
        }
    }

    /// Error object body, `ObjectStart` already consumed. Entries without
    /// a message are dropped.
    fn parse_error_object(&mut self) -> Result<Option<ExecutionError>> {
        let mut message: Option<String> = None;
        let mut code: Option<String> = None;

        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => break,
                Some(Token::Key(key)) => match key {
                    b"message" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => message = Some(unescape(raw)?.into_owned()),
                        Some(Token::Null) => {}
                        _ => return Err(parse_err("error message must be a string")),
                    },
                    b"code" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => code = Some(unescape(raw)?.into_owned()),
                        Some(Token::Null) => {}
                        _ => return Err(parse_err("error code must be a string")),
                    },
                    _ => self.tok.skip_value()?,
                },
                _ => return Err(parse_err("malformed error object")),
            }
        }

        Ok(message.map(|message| ExecutionError { message, code }))
    }

    /// `{"result": {...}}` body of an execute response.
    fn parse_execute_response(&mut self) -> Result<()> {
        self.expect_object_start("execute response")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => return Ok(()),
                Some(Token::Key(b"result")) => {
                    self.expect_object_start("execute result")?;
                    self.read_results()?;
                }
                Some(Token::Key(_)) => self.tok.skip_value()?,
                _ => return Err(parse_err("malformed execute response")),
            }
        }
    }

    /// `{"result": {"step_results": [...], "step_errors": [...]}}` body of
    /// a batch response.
    fn parse_batch_response(&mut self) -> Result<()> {
        self.expect_object_start("batch response")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => return Ok(()),
                Some(Token::Key(b"result")) => {
                    self.expect_object_start("batch result")?;
                    self.parse_batch_result()?;
                }
                Some(Token::Key(_)) => self.tok.skip_value()?,
                _ => return Err(parse_err("malformed batch response")),
            }
        }
    }

    fn parse_batch_result(&mut self) -> Result<()> {
        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => return Ok(()),
                Some(Token::Key(b"step_results")) => self.parse_step_results()?,
                Some(Token::Key(b"step_errors")) => self.parse_step_errors()?,
                Some(Token::Key(_)) => self.tok.skip_value()?,
                _ => return Err(parse_err("malformed batch result")),
            }
        }
    }

    /// `step_results`: one entry per step, visited with a zero-based
    /// counter. Ignored indices are skipped without being materialized; a
    /// null entry at a kept index is a step that did not execute and
    /// produces an empty row group with no stats.
    fn parse_step_results(&mut self) -> Result<()> {
        self.expect_array_start("step_results")?;
        let mut counter = 0usize;
        loop {
            let token = self.tok.next_token()?;
            if token == Some(Token::ArrayEnd) {
                return Ok(());
            }

            let ignored = self.ignored_steps.contains(&counter);
            counter += 1;

            match token {
                Some(Token::Null) => {
                    if !ignored {
                        self.row_groups.push(Vec::new());
                    }
                }
                Some(Token::ObjectStart) => {
                    if ignored {
                        self.tok.skip_to_container_end()?;
                    } else {
                        self.read_results()?;
                    }
                }
                _ => return Err(parse_err("step_results entry must be null or an object")),
            }
        }
    }

    /// `step_errors` entries are collected regardless of the ignore set:
    /// a failed synthetic BEGIN or COMMIT still surfaces as an error even
    /// though its row-group slot is discarded.
    fn parse_step_errors(&mut self) -> Result<()> {
        self.expect_array_start("step_errors")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ArrayEnd) => return Ok(()),
                Some(Token::Null) => {}
                Some(Token::ObjectStart) => {
                    if let Some(error) = self.parse_error_object()? {
                        self.errors.push(error);
                    }
                }
                _ => return Err(parse_err("step_errors entry must be null or an object")),
            }
        }
    }

    /// One result object (`ObjectStart` already consumed): columns, rows,
    /// and statistics, tolerated in any field order except that `cols`
    /// must precede the first non-empty row.
    fn read_results(&mut self) -> Result<()> {
        let mut cols: Vec<&'a [u8]> = Vec::new();
        let mut markers: Vec<RowMarker> = Vec::new();
        let mut stats = ExecutionStats::default();

        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => break,
                Some(Token::Key(key)) => match key {
                    b"cols" => self.parse_cols(&mut cols)?,
                    b"rows" => self.parse_rows(&cols, &mut markers)?,
                    b"rows_read" => stats.rows_read = self.parse_u64()?,
                    b"rows_written" => stats.rows_written = self.parse_u64()?,
                    b"affected_row_count" => stats.affected_rows = self.parse_u64()?,
                    b"query_duration_ms" => stats.query_duration_ms = self.parse_f64()?,
                    b"last_insert_rowid" => stats.last_insert_rowid = self.parse_opt_string()?,
                    b"replication_index" => stats.replication_index = self.parse_opt_string()?,
                    _ => self.tok.skip_value()?,
                },
                _ => return Err(parse_err("malformed result object")),
            }
        }

        self.stats.push(stats);
        self.row_groups.push(markers);
        Ok(())
    }

    fn parse_cols(&mut self, cols: &mut Vec<&'a [u8]>) -> Result<()> {
        self.expect_array_start("cols")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ArrayEnd) => return Ok(()),
                Some(Token::ObjectStart) => loop {
                    match self.tok.next_token()? {
                        Some(Token::ObjectEnd) => break,
                        Some(Token::Key(b"name")) => match self.tok.next_token()? {
                            Some(Token::Str(raw)) => cols.push(raw),
                            _ => return Err(parse_err("column name must be a string")),
                        },
                        Some(Token::Key(_)) => self.tok.skip_value()?,
                        _ => return Err(parse_err("malformed column object")),
                    }
                },
                _ => return Err(parse_err("cols entry must be an object")),
            }
        }
    }

    fn parse_rows(&mut self, cols: &[&'a [u8]], markers: &mut Vec<RowMarker>) -> Result<()> {
        self.expect_array_start("rows")?;
        loop {
            match self.tok.next_token()? {
                Some(Token::ArrayEnd) => return Ok(()),
                Some(Token::ArrayStart) => markers.push(self.read_row(cols)?),
                _ => return Err(parse_err("row must be an array")),
            }
        }
    }

    /// Convert one row (`ArrayStart` already consumed) into a normalized
    /// flat object in the output buffer and return its marker.
    fn read_row(&mut self, cols: &[&'a [u8]]) -> Result<RowMarker> {
        let start = self.buf.written();
        self.write_raw(b"{")?;

        let mut col_index = 0usize;
        loop {
            match self.tok.next_token()? {
                Some(Token::ArrayEnd) => break,
                Some(Token::ObjectStart) => {
                    let cell = self.read_cell()?;
                    let Some(&col) = cols.get(col_index) else {
                        return Err(parse_err(&format!(
                            "row cell at index {col_index} has no corresponding column \
                             (cols missing or shorter than the row)"
                        )));
                    };
                    self.write_cell(col, col_index > 0, cell)?;
                    col_index += 1;
                }
                _ => return Err(parse_err("row cell must be an object")),
            }
        }

        self.write_raw(b"}")?;
        Ok(RowMarker {
            offset: start,
            len: self.buf.written() - start,
        })
    }

    fn read_cell(&mut self) -> Result<Cell<'a>> {
        let mut cell = Cell {
            type_tag: None,
            value: None,
            base64: None,
        };

        loop {
            match self.tok.next_token()? {
                Some(Token::ObjectEnd) => return Ok(cell),
                Some(Token::Key(key)) => match key {
                    b"type" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => cell.type_tag = Some(raw),
                        _ => return Err(parse_err("cell type must be a string")),
                    },
                    b"value" => match self.tok.next_token()? {
                        Some(
                            token @ (Token::Str(_) | Token::Number(_) | Token::Bool(_)
                            | Token::Null),
                        ) => cell.value = Some(token),
                        _ => return Err(parse_err("cell value must be a scalar")),
                    },
                    b"base64" => match self.tok.next_token()? {
                        Some(Token::Str(raw)) => cell.base64 = Some(raw),
                        Some(Token::Null) => {}
                        _ => return Err(parse_err("cell base64 must be a string")),
                    },
                    _ => self.tok.skip_value()?,
                },
                _ => return Err(parse_err("malformed row cell")),
            }
        }
    }

    fn write_cell(&mut self, col: &[u8], need_comma: bool, cell: Cell<'_>) -> Result<()> {
        if need_comma {
            self.write_raw(b",")?;
        }
        self.write_raw(b"\"")?;
        self.write_raw(col)?;
        self.write_raw(b"\":")?;

        if let Some(base64) = cell.base64 {
            return self.write_json_string(base64);
        }

        match (cell.type_tag, cell.value) {
            (_, None) | (_, Some(Token::Null)) => self.write_raw(b"null"),
            (Some(b"integer"), Some(Token::Str(raw))) => self.write_reparsed_integer(raw),
            (Some(b"integer"), Some(Token::Number(raw))) => self.write_reparsed_integer(raw),
            (Some(b"float"), Some(Token::Number(raw))) => self.write_raw(raw),
            (_, Some(Token::Str(raw))) => self.write_json_string(raw),
            (_, Some(Token::Number(raw))) => self.write_json_string(raw),
            (_, Some(Token::Bool(true))) => self.write_json_string(b"true"),
            (_, Some(Token::Bool(false))) => self.write_json_string(b"false"),
            _ => self.write_raw(b"null"),
        }
    }

    /// Integer cells travel as decimal text; reparse to a 64-bit value and
    /// fall back to null when the text does not fit.
    fn write_reparsed_integer(&mut self, raw: &[u8]) -> Result<()> {
        let parsed = std::str::from_utf8(raw).ok().and_then(|s| s.parse::<i64>().ok());
        match parsed {
            Some(value) => {
                let text = value.to_string();
                self.write_raw(text.as_bytes())
            }
            None => self.write_raw(b"null"),
        }
    }

    /// Write a raw (still escaped) span as a JSON string value.
    fn write_json_string(&mut self, raw: &[u8]) -> Result<()> {
        self.write_raw(b"\"")?;
        self.write_raw(raw)?;
        self.write_raw(b"\"")
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let region = self.buf.reserve(bytes.len())?;
        region[..bytes.len()].copy_from_slice(bytes);
        self.buf.commit(bytes.len());
        Ok(())
    }

    fn parse_u64(&mut self) -> Result<u64> {
        match self.tok.next_token()? {
            Some(Token::Number(raw)) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| parse_err("invalid integer statistic")),
            Some(Token::Null) => Ok(0),
            _ => Err(parse_err("statistic must be a number")),
        }
    }

    fn parse_f64(&mut self) -> Result<f64> {
        match self.tok.next_token()? {
            Some(Token::Number(raw)) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| parse_err("invalid float statistic")),
            Some(Token::Null) => Ok(0.0),
            _ => Err(parse_err("statistic must be a number")),
        }
    }

    fn parse_opt_string(&mut self) -> Result<Option<String>> {
        match self.tok.next_token()? {
            Some(Token::Str(raw)) => Ok(Some(unescape(raw)?.into_owned())),
            Some(Token::Number(raw)) => Ok(Some(
                std::str::from_utf8(raw)
                    .map_err(|_| parse_err("invalid UTF-8 in statistic"))?
                    .to_string(),
            )),
            Some(Token::Null) => Ok(None),
            _ => Err(parse_err("statistic must be a string or null")),
        }
    }

    fn expect_object_start(&mut self, what: &str) -> Result<()> {
        match self.tok.next_token()? {
            Some(Token::ObjectStart) => Ok(()),
            _ => Err(parse_err(&format!("{what} must be an object"))),
        }
    }

    fn expect_array_start(&mut self, what: &str) -> Result<()> {
        match self.tok.next_token()? {
            Some(Token::ArrayStart) => Ok(()),
            _ => Err(parse_err(&format!("{what} must be an array"))),
        }
    }
}

fn parse_err(message: &str) -> LibSqlClientError {
    LibSqlClientError::Parse(message.to_string())
}
