//! Error types for the pull engine.

use tablesync_protocol::ProtocolError;
use tablesync_storage::StorageError;
use thiserror::Error;

/// Result type for pull operations.
pub type PullResult<T> = Result<T, PullError>;

/// Broad category of a [`PullError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input or a remote record failed validation.
    Validation,
    /// The remote source returned data that breaks pull's assumptions.
    DataIntegrity,
    /// The remote source could not be reached or refused the request.
    Transport,
    /// The local store failed.
    Storage,
}

/// Errors that can occur during pull operations.
#[derive(Error, Debug)]
pub enum PullError {
    /// The query uses a shape pull does not support.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Pull settings or engine configuration are invalid.
    #[error("invalid pull settings: {0}")]
    InvalidSettings(String),

    /// A fetched record has a missing or invalid id.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A fetched record is missing a required system column or carries a
    /// malformed one.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Network or transport error from the remote source.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether re-invoking pull may succeed.
        retryable: bool,
    },

    /// Local store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PullError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PullError::InvalidQuery(_)
            | PullError::InvalidSettings(_)
            | PullError::InvalidRecord(_) => ErrorKind::Validation,
            PullError::DataIntegrity(_) => ErrorKind::DataIntegrity,
            PullError::Transport { .. } => ErrorKind::Transport,
            PullError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if re-invoking pull with the same identity may succeed.
    ///
    /// The engine never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            PullError::Transport { retryable, .. } => *retryable,
            PullError::Storage(StorageError::Io(_) | StorageError::Locked) => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for PullError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidId(_) => PullError::InvalidRecord(err.to_string()),
            ProtocolError::MissingSystemColumn { .. }
            | ProtocolError::MalformedSystemColumn { .. } => {
                PullError::DataIntegrity(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(PullError::transport_retryable("connection lost").is_retryable());
        assert!(!PullError::transport_fatal("forbidden").is_retryable());
        assert!(PullError::Storage(StorageError::Locked).is_retryable());
        assert!(!PullError::InvalidQuery("ordering".into()).is_retryable());
        assert!(!PullError::DataIntegrity("bad".into()).is_retryable());
    }

    #[test]
    fn error_kinds() {
        assert_eq!(PullError::InvalidSettings("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(PullError::InvalidRecord("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(PullError::DataIntegrity("x".into()).kind(), ErrorKind::DataIntegrity);
        assert_eq!(PullError::transport_fatal("x").kind(), ErrorKind::Transport);
        assert_eq!(
            PullError::Storage(StorageError::TableNotDefined("t".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn protocol_errors_map_to_kinds() {
        let err: PullError = ProtocolError::invalid_id("empty").into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: PullError = ProtocolError::MissingSystemColumn { column: "deleted" }.into();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("deleted"));
    }
}
