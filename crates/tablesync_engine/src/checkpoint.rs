//! Checkpoint persistence.
//!
//! Each incremental pull identity owns one row in a dedicated local table.
//! The row records the highest change timestamp known to be fully pulled.
//! Vanilla pulls (no identity) never read or write a checkpoint.

use crate::error::{PullError, PullResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tablesync_protocol::system;
use tablesync_storage::{ColumnType, LocalStore, Row, RowId, TableSchema};

const TABLE_NAME_COLUMN: &str = "tableName";
const HIGH_WATER_MARK_COLUMN: &str = "highWaterMark";
const CREATED_AT_COLUMN: &str = "createdAt";
const UPDATED_AT_COLUMN: &str = "updatedAt";

/// A persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Pull identity owning the checkpoint.
    pub identity: String,
    /// Table the identity pulls from.
    pub table: String,
    /// Latest change timestamp fully pulled.
    pub high_water_mark: DateTime<Utc>,
    /// When the checkpoint row was first written.
    pub created_at: DateTime<Utc>,
    /// When the checkpoint row was last written.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(system::ID.into(), Value::from(self.identity.as_str()));
        row.insert(TABLE_NAME_COLUMN.into(), Value::from(self.table.as_str()));
        row.insert(
            HIGH_WATER_MARK_COLUMN.into(),
            Value::from(system::format_timestamp(&self.high_water_mark)),
        );
        row.insert(
            CREATED_AT_COLUMN.into(),
            Value::from(system::format_timestamp(&self.created_at)),
        );
        row.insert(
            UPDATED_AT_COLUMN.into(),
            Value::from(system::format_timestamp(&self.updated_at)),
        );
        row
    }

    fn from_row(identity: &str, row: &Row) -> PullResult<Self> {
        let table = row
            .get(TABLE_NAME_COLUMN)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            identity: identity.to_string(),
            table,
            high_water_mark: timestamp_column(identity, row, HIGH_WATER_MARK_COLUMN)?,
            created_at: timestamp_column(identity, row, CREATED_AT_COLUMN)?,
            updated_at: timestamp_column(identity, row, UPDATED_AT_COLUMN)?,
        })
    }
}

fn timestamp_column(identity: &str, row: &Row, column: &str) -> PullResult<DateTime<Utc>> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(system::parse_timestamp)
        .ok_or_else(|| {
            PullError::DataIntegrity(format!(
                "checkpoint {identity:?} has no valid {column} column"
            ))
        })
}

/// Reads and writes checkpoints in the local store.
pub struct CheckpointStore<S: LocalStore> {
    store: Arc<S>,
    table: String,
}

impl<S: LocalStore> CheckpointStore<S> {
    /// Creates an adapter over `store` using `table` for checkpoint rows.
    pub fn new(store: Arc<S>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// The definition of the checkpoint table.
    pub fn schema(&self) -> TableSchema {
        TableSchema::new(self.table.as_str())
            .with_column(system::ID, ColumnType::Text)
            .with_column(TABLE_NAME_COLUMN, ColumnType::Text)
            .with_column(HIGH_WATER_MARK_COLUMN, ColumnType::Date)
            .with_column(CREATED_AT_COLUMN, ColumnType::Date)
            .with_column(UPDATED_AT_COLUMN, ColumnType::Date)
    }

    /// Defines the checkpoint table. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the table cannot be defined.
    pub async fn initialize(&self) -> PullResult<()> {
        self.store.define_table(&self.schema()).await?;
        Ok(())
    }

    /// Reads the stored checkpoint of an identity, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails, or a data integrity
    /// error if the stored row is malformed.
    pub async fn get(&self, identity: &str) -> PullResult<Option<Checkpoint>> {
        let row = self
            .store
            .lookup(&self.table, &RowId::from(identity), true)
            .await?;
        row.map(|row| Checkpoint::from_row(identity, &row))
            .transpose()
    }

    /// Returns the cursor a pull should start from.
    ///
    /// Absent identities and identities without a stored checkpoint start
    /// from [`system::beginning_of_time`].
    ///
    /// # Errors
    ///
    /// Fails only on storage errors or a malformed stored row.
    pub async fn load(&self, identity: Option<&str>) -> PullResult<DateTime<Utc>> {
        let Some(identity) = identity else {
            return Ok(system::beginning_of_time());
        };
        Ok(self
            .get(identity)
            .await?
            .map(|c| c.high_water_mark)
            .unwrap_or_else(system::beginning_of_time))
    }

    /// Records the high-water-mark for an identity.
    ///
    /// A no-op for vanilla pulls. Upserts keyed by identity, so retrying
    /// with the same value is harmless.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the upsert fails.
    pub async fn save(
        &self,
        identity: Option<&str>,
        table: &str,
        high_water_mark: DateTime<Utc>,
    ) -> PullResult<()> {
        let Some(identity) = identity else {
            return Ok(());
        };

        let now = Utc::now();
        let created_at = match self.get(identity).await {
            Ok(Some(existing)) => existing.created_at,
            // A malformed row is overwritten rather than blocking the pull.
            Ok(None) | Err(PullError::DataIntegrity(_)) => now,
            Err(e) => return Err(e),
        };

        let checkpoint = Checkpoint {
            identity: identity.to_string(),
            table: table.to_string(),
            high_water_mark,
            created_at,
            updated_at: now,
        };
        self.store.upsert(&self.table, &[checkpoint.to_row()]).await?;
        Ok(())
    }

    /// Deletes the checkpoint of an identity.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn remove(&self, identity: &str) -> PullResult<()> {
        self.store
            .delete(&self.table, &[RowId::from(identity)])
            .await?;
        Ok(())
    }
}
