//! Error types for protocol values.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting remote rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A record id is missing or not a valid identifier.
    #[error("invalid record id: {0}")]
    InvalidId(String),

    /// A required system column is absent from a row.
    #[error("required system column {column} is missing")]
    MissingSystemColumn {
        /// The column name.
        column: &'static str,
    },

    /// A system column is present but has the wrong shape.
    #[error("system column {column} is malformed: {reason}")]
    MalformedSystemColumn {
        /// The column name.
        column: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates an invalid id error.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId(message.into())
    }
}
