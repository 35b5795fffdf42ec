//! Local store trait definition.

use crate::error::StorageResult;
use crate::row::{Row, RowId, TableSchema};
use async_trait::async_trait;

/// The local persisted store a client operates against.
///
/// Stores hold rows grouped in tables. They do not interpret columns beyond
/// the declared schema and know nothing about synchronization.
///
/// # Invariants
///
/// - A table must be defined before rows are read or written
/// - `delete` and `upsert` are each atomic per call: either every row in the
///   batch is applied or none is
/// - `delete` of an absent id is not an error
/// - `upsert` merges the given columns into an existing row with the same id
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Defines (or redefines) a table.
    ///
    /// Redefining an existing table keeps its rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition cannot be persisted.
    async fn define_table(&self, schema: &TableSchema) -> StorageResult<()>;

    /// Looks up one row by id.
    ///
    /// When `suppress_not_found` is true a missing row yields `Ok(None)`;
    /// otherwise it is reported as [`crate::StorageError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined or the row is missing
    /// and not suppressed.
    async fn lookup(
        &self,
        table: &str,
        id: &RowId,
        suppress_not_found: bool,
    ) -> StorageResult<Option<Row>>;

    /// Deletes a batch of rows by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined or the change cannot be
    /// persisted.
    async fn delete(&self, table: &str, ids: &[RowId]) -> StorageResult<()>;

    /// Inserts or merges a batch of rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined, a row has no id, a
    /// column violates the schema, or the change cannot be persisted.
    async fn upsert(&self, table: &str, rows: &[Row]) -> StorageResult<()>;
}
