//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The table was used before `define_table` was called for it.
    #[error("table not defined: {0}")]
    TableNotDefined(String),

    /// A lookup without `suppress_not_found` found no row.
    #[error("row {id} not found in table {table}")]
    NotFound {
        /// The table that was searched.
        table: String,
        /// The missing row id.
        id: String,
    },

    /// A row could not be stored (for example it has no usable id).
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A value does not match the declared column type.
    #[error("column {column} of table {table} expects {expected}")]
    ColumnType {
        /// The table being written.
        table: String,
        /// The offending column.
        column: String,
        /// The declared column type.
        expected: String,
    },

    /// The persisted snapshot could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process holds the store directory.
    #[error("store is locked by another process")]
    Locked,
}

impl StorageError {
    /// Creates an invalid row error.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::NotFound {
            table: "todo".into(),
            id: "a".into(),
        };
        assert_eq!(err.to_string(), "row a not found in table todo");

        let err = StorageError::TableNotDefined("todo".into());
        assert!(err.to_string().contains("todo"));
    }
}
