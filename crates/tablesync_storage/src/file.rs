//! File-based table store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::memory::{Snapshot, Tables};
use crate::row::{Row, RowId, TableSchema};
use crate::store::LocalStore;
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "store.lock";
const DATA_FILE: &str = "tables.cbor";
const TEMP_FILE: &str = "tables.cbor.tmp";

/// A directory-backed table store.
///
/// All tables are held in memory and written out as one CBOR snapshot
/// after every mutating call. Data survives process restarts.
///
/// # Durability
///
/// The snapshot is written to a temporary file, synced, then renamed over
/// the previous snapshot, so a crash leaves either the old or the new
/// state on disk.
///
/// # Exclusivity
///
/// Opening a store takes an exclusive lock on `store.lock` in the
/// directory. A second open, from this or another process, fails with
/// [`StorageError::Locked`] until the first store is dropped.
///
/// # Runtime
///
/// Mutating calls write the snapshot on tokio's blocking pool, so they
/// must be awaited inside a tokio runtime.
///
/// # Example
///
/// ```no_run
/// use tablesync_storage::FileStore;
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("client-data")).unwrap();
/// println!("{:?}", store.table_names());
/// ```
#[derive(Debug)]
pub struct FileStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    tables: RwLock<Tables>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, another store
    /// holds the lock, or the existing snapshot cannot be decoded.
    pub fn open(path: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let data_path = path.join(DATA_FILE);
        let tables = if data_path.exists() {
            let reader = BufReader::new(File::open(&data_path)?);
            let snapshot: Snapshot = ciborium::from_reader(reader)
                .map_err(|e| StorageError::Codec(e.to_string()))?;
            Tables::from_snapshot(snapshot)?
        } else {
            Tables::default()
        };

        tracing::debug!(path = %path.display(), "opened file store");

        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                tables: RwLock::new(tables),
                _lock_file: lock_file,
            }),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the names of all defined tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables.read().table_names()
    }

    /// Returns a copy of every row in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not defined.
    pub fn rows(&self, table: &str) -> StorageResult<Vec<Row>> {
        self.inner.tables.read().rows(table)
    }

    /// Runs `change` and the snapshot write on the blocking pool so that
    /// file I/O never runs on an async worker.
    async fn mutate<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Tables) -> StorageResult<()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.mutate(change))
            .await
            .map_err(|e| StorageError::Io(io::Error::other(e)))?
    }
}

impl Inner {
    /// Applies `change` to a copy of the tables, persists the copy, then
    /// swaps it in. A failed write leaves the in-memory state untouched.
    fn mutate<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Tables) -> StorageResult<()>,
    {
        let mut guard = self.tables.write();
        let mut next = guard.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, tables: &Tables) -> StorageResult<()> {
        let temp_path = self.path.join(TEMP_FILE);
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            ciborium::into_writer(&tables.to_snapshot(), &mut writer)
                .map_err(|e| StorageError::Codec(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&temp_path, self.path.join(DATA_FILE))?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn define_table(&self, schema: &TableSchema) -> StorageResult<()> {
        let schema = schema.clone();
        self.mutate(move |tables| {
            tables.define(&schema);
            Ok(())
        })
        .await
    }

    async fn lookup(
        &self,
        table: &str,
        id: &RowId,
        suppress_not_found: bool,
    ) -> StorageResult<Option<Row>> {
        self.inner.tables.read().lookup(table, id, suppress_not_found)
    }

    async fn delete(&self, table: &str, ids: &[RowId]) -> StorageResult<()> {
        let table = table.to_string();
        let ids = ids.to_vec();
        self.mutate(move |tables| tables.delete(&table, &ids)).await
    }

    async fn upsert(&self, table: &str, rows: &[Row]) -> StorageResult<()> {
        let table = table.to_string();
        let rows = rows.to_vec();
        self.mutate(move |tables| tables.upsert(&table, &rows)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::ColumnType;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .define_table(&TableSchema::new("todo").with_column("done", ColumnType::Boolean))
                .await
                .unwrap();
            store
                .upsert(
                    "todo",
                    &[
                        row(json!({"id": "a", "done": true, "score": 1.5})),
                        row(json!({"id": 9, "done": false})),
                    ],
                )
                .await
                .unwrap();
            store.delete("todo", &[RowId::from(9)]).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.table_names(), vec!["todo".to_string()]);
        let rows = store.rows("todo").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["done"], json!(true));
        assert_eq!(rows[0]["score"], json!(1.5));
    }

    #[tokio::test]
    async fn file_store_failed_write_keeps_state() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .define_table(&TableSchema::new("todo").with_column("done", ColumnType::Boolean))
            .await
            .unwrap();

        let result = store
            .upsert("todo", &[row(json!({"id": "a", "done": "maybe"}))])
            .await;
        assert!(result.is_err());
        assert!(store.rows("todo").unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_store_writes_do_not_block_the_runtime() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        store.define_table(&TableSchema::new("todo")).await.unwrap();

        let writers: Vec<_> = (1..=8)
            .map(|id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.upsert("todo", &[row(json!({"id": id}))]).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        assert_eq!(store.rows("todo").unwrap().len(), 8);
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.rows("todo").unwrap().len(), 8);
    }

    #[test]
    fn file_store_is_exclusive() {
        let dir = tempdir().unwrap();
        let _first = FileStore::open(dir.path()).unwrap();
        let second = FileStore::open(dir.path());
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn file_store_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        assert_eq!(store.path(), nested.as_path());
        assert!(store.table_names().is_empty());
    }
}
