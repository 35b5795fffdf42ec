//! Rows, row ids and table definitions.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the primary key column every stored row carries.
pub const ID_COLUMN: &str = "id";

/// A table row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// The primary key of a row.
///
/// Rows are keyed either by a string or by an integer, matching what a
/// table-shaped remote source hands out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    /// Integer key.
    Integer(i64),
    /// String key.
    Text(String),
}

impl RowId {
    /// Converts a JSON value into a row id, if it has a key shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RowId::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(RowId::Integer),
            _ => None,
        }
    }

    /// Converts the id back to its JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            RowId::Integer(i) => Value::from(*i),
            RowId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Integer(i) => write!(f, "{i}"),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId::Text(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId::Text(s)
    }
}

impl From<i64> for RowId {
    fn from(i: i64) -> Self {
        RowId::Integer(i)
    }
}

/// Extracts the id of a row.
///
/// # Errors
///
/// Returns [`StorageError::InvalidRow`] if the row has no `id` column or the
/// column is neither a string nor an integer.
pub fn row_id_of(row: &Row) -> StorageResult<RowId> {
    row.get(ID_COLUMN)
        .and_then(RowId::from_value)
        .ok_or_else(|| StorageError::invalid_row("row has no string or integer id"))
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// UTF-8 string.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Real,
    /// Boolean.
    Boolean,
    /// RFC 3339 timestamp stored as a string.
    Date,
    /// Arbitrary JSON object or array.
    Object,
}

impl ColumnType {
    /// Returns true if `value` may be stored in a column of this type.
    ///
    /// `null` is accepted by every column type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Text, Value::String(_)) => true,
            (ColumnType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ColumnType::Real, Value::Number(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Date, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (ColumnType::Object, Value::Object(_) | Value::Array(_)) => true,
            _ => false,
        }
    }

    /// Returns the lowercase name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Object => "object",
        }
    }
}

/// Definition of a table: its name and declared columns.
///
/// Columns that are not declared are stored without type checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Declared columns.
    pub columns: BTreeMap<String, ColumnType>,
}

impl TableSchema {
    /// Creates a schema with only the `id` column declared.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Declares a column.
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    /// Checks every declared column present in `row` against its type.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ColumnType`] for the first mismatching column.
    pub fn check_row(&self, row: &Row) -> StorageResult<()> {
        for (column, column_type) in &self.columns {
            if let Some(value) = row.get(column) {
                if !column_type.accepts(value) {
                    return Err(StorageError::ColumnType {
                        table: self.name.clone(),
                        column: column.clone(),
                        expected: column_type.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
