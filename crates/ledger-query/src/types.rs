//! Core types shared by the ledger handle, the query runner and its callers
//!
//! Values, rows and row sources are backend-neutral: the SQLite adapter and
//! any other `LedgerDb` implementation produce the same types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// A single column value as stored by the ledger database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// Floating point number
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl Value {
    /// Whether this value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value. Reals are accepted only when integral.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric view of the value
    ///
    /// The ledger stores amounts with SQLite's NUMERIC affinity, so a column
    /// may come back as an integer, a real, or numeric text depending on how
    /// the row was written.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: ordered values with the column names they came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Missing column names are filled positionally.
    pub fn new(mut columns: Vec<String>, values: Vec<Value>) -> Self {
        while columns.len() < values.len() {
            columns.push(format!("column{}", columns.len()));
        }
        columns.truncate(values.len());
        Row { columns, values }
    }

    /// Create a row without column names
    pub fn from_values(values: Vec<Value>) -> Self {
        Row::new(Vec::new(), values)
    }

    /// Value at a column position
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value for a column name
    pub fn get_named(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Column names, in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column values, in result order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into the ordered value sequence
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Consume into a field-name-keyed mapping, keeping column order
    pub fn into_map(self) -> IndexMap<String, Value> {
        self.columns.into_iter().zip(self.values).collect()
    }
}

/// Pending result rows of an executed statement (cursor equivalent)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSource {
    rows: VecDeque<Row>,
}

impl RowSource {
    /// A source that yields no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// A source over already materialized rows
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        RowSource {
            rows: rows.into_iter().collect(),
        }
    }

    /// Take the next row, if any
    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Take every remaining row
    pub fn fetch_all(self) -> Vec<Row> {
        self.rows.into()
    }

    /// Number of rows not yet fetched
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Append the rows of another source
    pub fn extend(&mut self, other: RowSource) {
        self.rows.extend(other.rows);
    }
}

impl Iterator for RowSource {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch_one()
    }
}

/// Bind parameters for a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// Statement has no placeholders
    #[default]
    None,
    /// One set of positional bind values
    Single(Vec<Value>),
    /// Run the statement once per set of bind values
    Batch(Vec<Vec<Value>>),
}

impl Params {
    /// Build a single parameter set
    pub fn single<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Single(values.into_iter().map(Into::into).collect())
    }

    /// Build a batch of parameter sets
    pub fn batch<I, R, V>(sets: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Batch(
            sets.into_iter()
                .map(|set| set.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_set(f: &mut fmt::Formatter<'_>, set: &[Value]) -> fmt::Result {
            write!(f, "(")?;
            for (i, v) in set.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, ")")
        }

        match self {
            Params::None => write!(f, "()"),
            Params::Single(set) => write_set(f, set),
            Params::Batch(sets) => write!(f, "batch of {}", sets.len()),
        }
    }
}

/// Errors raised by a ledger handle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    /// Database locked or busy; worth retrying
    #[error("Database busy: {reason}")]
    Busy { reason: String },

    /// Statement can never succeed as written (syntax, binding, schema)
    #[error("Statement rejected: {reason}")]
    Rejected { reason: String },

    /// Any other backend failure
    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

impl DbError {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DbError::Rejected { .. })
    }
}

/// Database result type
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_positional_and_named_access() {
        let row = Row::new(
            vec!["block_height".to_string(), "address".to_string()],
            vec![Value::Integer(42), Value::from("abc")],
        );

        assert_eq!(row.get(0), Some(&Value::Integer(42)));
        assert_eq!(row.get_named("address"), Some(&Value::from("abc")));
        assert_eq!(row.get_named("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_into_map_keeps_column_order() {
        let row = Row::new(
            vec!["b".to_string(), "a".to_string()],
            vec![Value::Integer(1), Value::Integer(2)],
        );
        let keys: Vec<String> = row.into_map().into_keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_row_fills_missing_column_names() {
        let row = Row::from_values(vec![Value::Null, Value::Real(1.5)]);
        assert_eq!(row.columns(), &["column0", "column1"]);
    }

    #[test]
    fn test_row_source_fetches_in_order() {
        let mut source = RowSource::from_rows(vec![
            Row::from_values(vec![Value::Integer(1)]),
            Row::from_values(vec![Value::Integer(2)]),
        ]);

        assert_eq!(source.remaining(), 2);
        assert_eq!(source.fetch_one().and_then(|r| r.get(0)?.as_i64()), Some(1));
        assert_eq!(source.fetch_one().and_then(|r| r.get(0)?.as_i64()), Some(2));
        assert!(source.fetch_one().is_none());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Value::from("12.5").as_f64(), Some(12.5));
        assert_eq!(Value::Real(3.0).as_i64(), Some(3));
        assert_eq!(Value::Real(3.5).as_i64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_params_builders() {
        assert_eq!(
            Params::single(["a", "b"]),
            Params::Single(vec![Value::from("a"), Value::from("b")])
        );
        let batch = Params::batch(vec![vec![1i64], vec![2i64]]);
        assert_eq!(batch.to_string(), "batch of 2");
        assert_eq!(Params::single([1i64, 2]).to_string(), "(1, 2)");
    }

    #[test]
    fn test_rejected_errors_are_not_retryable() {
        assert!(!DbError::Rejected { reason: "syntax".into() }.is_retryable());
        assert!(DbError::Busy { reason: "locked".into() }.is_retryable());
        assert!(DbError::Backend { reason: "io".into() }.is_retryable());
    }
}
