//! # tablesync Storage
//!
//! Local table store trait and implementations for tablesync.
//!
//! This crate provides the persisted store the pull engine writes into.
//! Stores are **table-shaped row stores**: they know table definitions and
//! row identifiers, but nothing about synchronization, checkpoints or
//! pending mutations.
//!
//! ## Design Principles
//!
//! - Four operations: define a table, look up one row, delete a batch,
//!   upsert a batch
//! - Each call is atomic on its own; callers batch
//! - Must be `Send + Sync` so one store can serve pull and push paths
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral clients
//! - [`FileStore`] - Persists a CBOR snapshot of all tables in a directory
//!
//! ## Example
//!
//! ```rust
//! use tablesync_storage::{ColumnType, InMemoryStore, LocalStore, RowId, TableSchema};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let store = InMemoryStore::new();
//! let schema = TableSchema::new("todo").with_column("title", ColumnType::Text);
//! store.define_table(&schema).await.unwrap();
//!
//! let row = json!({"id": "a", "title": "milk"}).as_object().cloned().unwrap();
//! store.upsert("todo", &[row]).await.unwrap();
//!
//! let found = store.lookup("todo", &RowId::from("a"), true).await.unwrap();
//! assert!(found.is_some());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod row;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use row::{row_id_of, ColumnType, Row, RowId, TableSchema, ID_COLUMN};
pub use store::LocalStore;
