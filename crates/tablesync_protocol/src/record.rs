//! Validated view of a remote row.

use crate::error::ProtocolResult;
use crate::id::validate_record_id;
use crate::system;
use tablesync_storage::{Row, RowId};

/// A row fetched from the remote source, with its system columns checked.
#[derive(Debug, Clone, PartialEq)]
pub struct PulledRecord {
    /// Validated record id.
    pub id: RowId,
    /// Soft-delete flag.
    pub deleted: bool,
    /// The row as received.
    pub row: Row,
}

impl PulledRecord {
    /// Validates a remote row.
    ///
    /// The id is checked first, then the delete flag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProtocolError::InvalidId`] for a bad id and
    /// [`crate::ProtocolError::MissingSystemColumn`] when the delete flag is
    /// absent or not a boolean.
    pub fn from_row(row: Row) -> ProtocolResult<Self> {
        let id = validate_record_id(row.get(system::ID))?;
        let deleted = system::deleted_flag(&row)?;
        Ok(Self { id, deleted, row })
    }
}
