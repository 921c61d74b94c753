//! Backend-neutral parameter and row types.

use chrono::{DateTime, Utc};
use notescan_core::parse_timestamp;

use crate::StorageError;

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One write in the common `?`-placeholder dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self { sql: sql.into(), params }
    }
}

/// Outcome of a write. Zero rows on an INSERT means the value already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    pub rows_affected: u64,
}

impl RunResult {
    #[must_use]
    pub const fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    #[must_use]
    pub const fn changed(&self) -> bool {
        self.rows_affected > 0
    }
}

/// A decoded result row: column names paired with values, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().position(|c| c == column).and_then(|idx| self.values.get(idx))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, column: &str) -> Result<&SqlValue, StorageError> {
        self.get(column)
            .ok_or_else(|| StorageError::DataCorruption(format!("missing column {column}")))
    }

    /// Text column; integers are rendered rather than rejected.
    pub fn text(&self, column: &str) -> Result<String, StorageError> {
        self.opt_text(column)?
            .ok_or_else(|| StorageError::DataCorruption(format!("column {column} is NULL")))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StorageError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            SqlValue::Integer(i) => Ok(Some(i.to_string())),
            other => Err(StorageError::DataCorruption(format!(
                "column {column}: expected text, got {other:?}"
            ))),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, StorageError> {
        match self.require(column)? {
            SqlValue::Integer(i) => Ok(*i),
            SqlValue::Text(s) => s.parse().map_err(|_| {
                StorageError::DataCorruption(format!("column {column}: {s:?} is not an integer"))
            }),
            other => Err(StorageError::DataCorruption(format!(
                "column {column}: expected integer, got {other:?}"
            ))),
        }
    }

    /// Timestamp column. SQLite stores these as text, PostgreSQL natively.
    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, StorageError> {
        match self.require(column)? {
            SqlValue::Timestamp(ts) => Ok(*ts),
            SqlValue::Text(s) => parse_timestamp(s).ok_or_else(|| {
                StorageError::DataCorruption(format!("column {column}: bad timestamp {s:?}"))
            }),
            other => Err(StorageError::DataCorruption(format!(
                "column {column}: expected timestamp, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new(
            vec!["id".to_owned(), "serial_number".to_owned(), "source_filename".to_owned(), "extracted_at".to_owned()],
            vec![
                SqlValue::Integer(4),
                SqlValue::Text("LB42836549R".to_owned()),
                SqlValue::Null,
                SqlValue::Text("2024-05-01T10:00:00.000Z".to_owned()),
            ],
        )
    }

    #[test]
    fn typed_accessors_decode_columns() {
        let row = sample_row();
        assert_eq!(row.integer("id").ok(), Some(4));
        assert_eq!(row.text("serial_number").ok().as_deref(), Some("LB42836549R"));
        assert_eq!(row.opt_text("source_filename").ok(), Some(None));
        assert!(row.timestamp("extracted_at").is_ok());
    }

    #[test]
    fn missing_or_null_columns_are_corruption() {
        let row = sample_row();
        assert!(matches!(row.text("status"), Err(StorageError::DataCorruption(_))));
        assert!(matches!(row.text("source_filename"), Err(StorageError::DataCorruption(_))));
        assert!(matches!(row.integer("serial_number"), Err(StorageError::DataCorruption(_))));
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".to_owned()));
    }
}
