//! In-memory table store for testing.

use crate::error::{StorageError, StorageResult};
use crate::row::{row_id_of, Row, RowId, TableSchema};
use crate::store::LocalStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A table and its rows, keyed by id.
#[derive(Debug, Clone)]
struct StoredTable {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
}

/// The set of tables held by a store.
///
/// Shared by [`InMemoryStore`] and [`crate::FileStore`]; the file store
/// snapshots it after every mutating call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    tables: BTreeMap<String, StoredTable>,
}

/// Serialized form of [`Tables`].
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    tables: Vec<TableSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableSnapshot {
    schema: TableSchema,
    rows: Vec<Row>,
}

impl Tables {
    /// Defines or redefines a table, keeping existing rows.
    pub fn define(&mut self, schema: &TableSchema) {
        match self.tables.get_mut(&schema.name) {
            Some(table) => table.schema = schema.clone(),
            None => {
                self.tables.insert(
                    schema.name.clone(),
                    StoredTable {
                        schema: schema.clone(),
                        rows: BTreeMap::new(),
                    },
                );
            }
        }
    }

    fn table(&self, name: &str) -> StorageResult<&StoredTable> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotDefined(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut StoredTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableNotDefined(name.to_string()))
    }

    /// Looks up one row.
    ///
    /// # Errors
    ///
    /// See [`LocalStore::lookup`].
    pub fn lookup(
        &self,
        table: &str,
        id: &RowId,
        suppress_not_found: bool,
    ) -> StorageResult<Option<Row>> {
        let stored = self.table(table)?;
        match stored.rows.get(id) {
            Some(row) => Ok(Some(row.clone())),
            None if suppress_not_found => Ok(None),
            None => Err(StorageError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// Deletes rows by id. Absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined.
    pub fn delete(&mut self, table: &str, ids: &[RowId]) -> StorageResult<()> {
        let stored = self.table_mut(table)?;
        for id in ids {
            stored.rows.remove(id);
        }
        Ok(())
    }

    /// Inserts or merges rows. Nothing is written unless every row is valid.
    ///
    /// # Errors
    ///
    /// See [`LocalStore::upsert`].
    pub fn upsert(&mut self, table: &str, rows: &[Row]) -> StorageResult<()> {
        let stored = self.table_mut(table)?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row_id_of(row)?;
            stored.schema.check_row(row)?;
            keyed.push((id, row));
        }

        for (id, row) in keyed {
            let entry = stored.rows.entry(id).or_default();
            for (column, value) in row {
                entry.insert(column.clone(), value.clone());
            }
        }
        Ok(())
    }

    /// Returns every row of a table in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined.
    pub fn rows(&self, table: &str) -> StorageResult<Vec<Row>> {
        Ok(self.table(table)?.rows.values().cloned().collect())
    }

    /// Returns the names of all defined tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            tables: self
                .tables
                .values()
                .map(|t| TableSnapshot {
                    schema: t.schema.clone(),
                    rows: t.rows.values().cloned().collect(),
                })
                .collect(),
        }
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot) -> StorageResult<Self> {
        let mut tables = Tables::default();
        for table in snapshot.tables {
            tables.define(&table.schema);
            tables.upsert(&table.schema.name, &table.rows)?;
        }
        Ok(tables)
    }
}

/// An in-memory table store.
///
/// This store keeps all tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral clients that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined.
    pub fn rows(&self, table: &str) -> StorageResult<Vec<Row>> {
        self.tables.read().rows(table)
    }

    /// Returns the number of rows in a table, or 0 if it is not defined.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().rows(table).map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn define_table(&self, schema: &TableSchema) -> StorageResult<()> {
        self.tables.write().define(schema);
        Ok(())
    }

    async fn lookup(
        &self,
        table: &str,
        id: &RowId,
        suppress_not_found: bool,
    ) -> StorageResult<Option<Row>> {
        self.tables.read().lookup(table, id, suppress_not_found)
    }

    async fn delete(&self, table: &str, ids: &[RowId]) -> StorageResult<()> {
        self.tables.write().delete(table, ids)
    }

    async fn upsert(&self, table: &str, rows: &[Row]) -> StorageResult<()> {
        self.tables.write().upsert(table, rows)
    }
}
