//! Forward-only reader over a decoded pipeline response.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::buffer::PooledBufWriter;
use crate::error::{ExecutionErrors, LibSqlClientError, Result};

use super::tokenizer::{unescape, JsonTokenizer, Token};
use super::types::{ExecutionError, ExecutionStats, RowMarker};

/// Scalar value extracted from the first cell of a result.
///
/// Normalized rows only ever contain nulls, numbers, and strings, so these
/// three variants are the complete set; a null cell reads as absent.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Text (including base64-encoded blobs).
    Text(String),
}

/// Reader over the decoded result of one pipeline call.
///
/// The reader exclusively owns the normalized row buffer; row markers are
/// back-references into it. Dropping the reader zeroes the buffer and
/// returns it to the shared pool, which is also why a dropped reader
/// cannot be read from: ownership makes use-after-dispose unrepresentable.
///
/// The cursor is forward-only. `has_more_results` advances it by one group
/// and reports whether a group is there; `read` deserializes the group
/// under the cursor.
#[derive(Debug)]
pub struct ResultReader {
    buf: PooledBufWriter,
    baton: Option<String>,
    errors: Vec<ExecutionError>,
    stats: Vec<ExecutionStats>,
    row_groups: Vec<Vec<RowMarker>>,
    /// 0 = before the first group; current group is `cursor - 1`.
    cursor: usize,
}

impl ResultReader {
    pub(crate) fn new(
        buf: PooledBufWriter,
        baton: Option<String>,
        errors: Vec<ExecutionError>,
        stats: Vec<ExecutionStats>,
        row_groups: Vec<Vec<RowMarker>>,
    ) -> Self {
        Self {
            buf,
            baton,
            errors,
            stats,
            row_groups,
            cursor: 0,
        }
    }

    /// Number of row groups (one per executed, non-ignored statement).
    #[inline]
    pub fn count(&self) -> usize {
        self.row_groups.len()
    }

    /// Continuation token for interactive pipeline sessions, if any.
    #[inline]
    pub fn baton(&self) -> Option<&str> {
        self.baton.as_deref()
    }

    /// Execution errors, in response order.
    #[inline]
    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    /// Execution statistics, in response order.
    #[inline]
    pub fn stats(&self) -> &[ExecutionStats] {
        &self.stats
    }

    /// Total number of affected rows across all statements.
    pub fn affected_rows(&self) -> u64 {
        self.stats.iter().map(|s| s.affected_rows).sum()
    }

    /// Fail with the aggregated execution errors if the server reported
    /// any. Callers are expected to check this before reading row groups;
    /// a group that errored reads as empty otherwise.
    pub fn check_errors(&self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ExecutionErrors::new(self.errors.clone()).into())
    }

    /// Advance the cursor and report whether it now sits on a group.
    ///
    /// Returns true exactly `count()` times; once false it stays false
    /// without moving further.
    pub fn has_more_results(&mut self) -> bool {
        if self.cursor <= self.row_groups.len() {
            self.cursor += 1;
        }
        self.cursor - 1 < self.row_groups.len()
    }

    /// Deserialize the row group under the cursor.
    ///
    /// Repeated calls are allowed and idempotent: each call re-walks the
    /// stored markers without refetching anything.
    pub fn read<T: DeserializeOwned>(&self) -> Result<Rows<'_, T>> {
        self.read_at(self.cursor as isize - 1)
    }

    /// Deserialize the row group at `index`. Negative indices count from
    /// the end (`-1` is the last group).
    ///
    /// # Errors
    ///
    /// Returns [`LibSqlClientError::IndexOutOfRange`] when the normalized
    /// index does not address a group.
    pub fn read_at<T: DeserializeOwned>(&self, index: isize) -> Result<Rows<'_, T>> {
        let count = self.row_groups.len() as isize;
        let normalized = if index < 0 { count + index } else { index };

        if normalized < 0 || normalized >= count {
            return Err(LibSqlClientError::IndexOutOfRange {
                index,
                count: self.row_groups.len(),
            });
        }

        Ok(Rows {
            buf: &self.buf,
            markers: self.row_groups[normalized as usize].iter(),
            _result: PhantomData,
        })
    }

    /// Value of the first column of the first row of group 0, or `None`
    /// when there are no groups, group 0 has no rows, or the cell is null.
    ///
    /// Reads the normalized token stream directly; no row type needed.
    pub fn scalar_value(&self) -> Option<ScalarValue> {
        let marker = self.row_groups.first()?.first()?;
        let mut tok = JsonTokenizer::new(self.buf.span(marker.offset, marker.len));

        loop {
            match tok.next_token() {
                Ok(Some(Token::Key(_))) => {
                    return match tok.next_token() {
                        Ok(Some(Token::Str(raw))) => {
                            unescape(raw).ok().map(|s| ScalarValue::Text(s.into_owned()))
                        }
                        Ok(Some(Token::Number(raw))) => {
                            let text = std::str::from_utf8(raw).ok()?;
                            text.parse::<i64>().map(ScalarValue::Integer).ok().or_else(
                                || text.parse::<f64>().map(ScalarValue::Float).ok(),
                            )
                        }
                        _ => None,
                    };
                }
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

/// Lazy iterator over one row group, deserializing each row on demand.
pub struct Rows<'r, T> {
    buf: &'r PooledBufWriter,
    markers: std::slice::Iter<'r, RowMarker>,
    _result: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for Rows<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let marker = self.markers.next()?;
        Some(
            serde_json::from_slice(self.buf.span(marker.offset, marker.len))
                .map_err(LibSqlClientError::from),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.markers.size_hint()
    }
}

impl<T: DeserializeOwned> ExactSizeIterator for Rows<'_, T> {}
