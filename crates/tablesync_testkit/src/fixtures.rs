//! Test fixtures and client helpers.
//!
//! Provides remote record builders, fixed instants, and pull clients wired
//! to in-memory or temporary file stores.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tablesync_engine::{
    EngineConfig, MemoryPendingLog, PullClient, PullResult, PullSettings, PullSummary,
    RemoteSource,
};
use tablesync_protocol::{system, SyncQuery};
use tablesync_storage::{
    ColumnType, FileStore, InMemoryStore, LocalStore, Row, RowId, TableSchema,
};
use tempfile::TempDir;

/// Table used by the fixtures.
pub const TODO_TABLE: &str = "todo";

/// Schema of [`TODO_TABLE`].
pub fn todo_schema() -> TableSchema {
    TableSchema::new(TODO_TABLE)
        .with_column("title", ColumnType::Text)
        .with_column(system::UPDATED_AT, ColumnType::Date)
        .with_column(system::DELETED, ColumnType::Boolean)
}

/// Returns the instant `secs` seconds after 2024-01-01T00:00:00Z.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid base instant")
        + Duration::seconds(secs)
}

/// Builds a remote record with an id, a change timestamp and a delete flag.
pub fn record(id: impl Into<Value>, updated_at: DateTime<Utc>, deleted: bool) -> Row {
    let id = id.into();
    let mut row = Row::new();
    row.insert("title".into(), Value::from(format!("item {id}")));
    row.insert(system::ID.into(), id);
    row.insert(
        system::UPDATED_AT.into(),
        Value::from(system::format_timestamp(&updated_at)),
    );
    row.insert(system::DELETED.into(), Value::Bool(deleted));
    row
}

/// Builds a remote record that lacks the delete flag.
pub fn record_without_flag(id: impl Into<Value>, updated_at: DateTime<Utc>) -> Row {
    let mut row = record(id, updated_at, false);
    row.remove(system::DELETED);
    row
}

/// Returns the ids of `rows`, sorted.
pub fn sorted_ids(rows: &[Row]) -> Vec<RowId> {
    let mut ids: Vec<RowId> = rows
        .iter()
        .filter_map(|row| row.get(system::ID).and_then(RowId::from_value))
        .collect();
    ids.sort();
    ids
}

/// A pull client with its collaborators exposed.
pub struct Harness<S: LocalStore, R: RemoteSource> {
    /// The local store.
    pub store: Arc<S>,
    /// The remote source.
    pub remote: Arc<R>,
    /// The pending-mutation log.
    pub pending: Arc<MemoryPendingLog>,
    /// The client under test.
    pub client: PullClient<S, R, MemoryPendingLog>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl<R: RemoteSource> Harness<InMemoryStore, R> {
    /// Creates a harness over an in-memory store with [`TODO_TABLE`] defined.
    pub async fn memory(remote: R) -> Self {
        Self::memory_with_config(remote, EngineConfig::default()).await
    }

    /// Like [`Harness::memory`], with a custom engine config.
    pub async fn memory_with_config(remote: R, config: EngineConfig) -> Self {
        Self::build(Arc::new(InMemoryStore::new()), remote, config, None).await
    }
}

impl<R: RemoteSource> Harness<FileStore, R> {
    /// Creates a harness over a file store in a fresh temporary directory.
    pub async fn file(remote: R) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self::build(Arc::new(store), remote, EngineConfig::default(), Some(temp_dir)).await
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        self.store.path()
    }
}

impl<S: LocalStore, R: RemoteSource> Harness<S, R> {
    async fn build(
        store: Arc<S>,
        remote: R,
        config: EngineConfig,
        temp_dir: Option<TempDir>,
    ) -> Self {
        store
            .define_table(&todo_schema())
            .await
            .expect("Failed to define todo table");
        let remote = Arc::new(remote);
        let pending = Arc::new(MemoryPendingLog::new());
        let client = PullClient::new(
            config,
            Arc::clone(&store),
            Arc::clone(&remote),
            Arc::clone(&pending),
        )
        .expect("Failed to create pull client");
        Self {
            store,
            remote,
            pending,
            client,
            _temp_dir: temp_dir,
        }
    }

    /// Pulls all of [`TODO_TABLE`] with default settings.
    pub async fn pull(&self, identity: Option<&str>) -> PullResult<PullSummary> {
        self.client
            .pull(&SyncQuery::new(TODO_TABLE), identity, PullSettings::default())
            .await
    }

    /// Pulls all of [`TODO_TABLE`] with the given page size.
    pub async fn pull_paged(
        &self,
        identity: Option<&str>,
        page_size: u32,
    ) -> PullResult<PullSummary> {
        self.client
            .pull(
                &SyncQuery::new(TODO_TABLE),
                identity,
                PullSettings::default().with_page_size(page_size),
            )
            .await
    }

    /// Returns the stored high-water-mark of an identity.
    pub async fn high_water_mark(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.client
            .checkpoint(identity)
            .await
            .expect("Failed to read checkpoint")
            .map(|c| c.high_water_mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_protocol::PulledRecord;

    #[test]
    fn record_is_a_valid_pulled_record() {
        let pulled = PulledRecord::from_row(record(7, at(3), true)).unwrap();
        assert_eq!(pulled.id, RowId::Integer(7));
        assert!(pulled.deleted);
        assert_eq!(system::updated_at(&pulled.row).unwrap(), at(3));
    }

    #[test]
    fn record_without_flag_is_rejected() {
        assert!(PulledRecord::from_row(record_without_flag("a", at(0))).is_err());
    }

    #[test]
    fn records_fit_the_todo_schema() {
        todo_schema().check_row(&record("a", at(1), false)).unwrap();
    }

    #[test]
    fn sorted_ids_orders_ids() {
        let rows = vec![record(3, at(0), false), record(1, at(0), false)];
        assert_eq!(sorted_ids(&rows), vec![RowId::Integer(1), RowId::Integer(3)]);
    }
}
