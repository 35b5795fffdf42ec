//! Page reconciliation against pending local mutations.

use crate::error::PullResult;
use crate::pending::PendingLog;
use crate::serializer::Serializer;
use std::sync::Arc;
use tablesync_protocol::PulledRecord;
use tablesync_storage::{LocalStore, Row, RowId};
use tracing::{debug, warn};

/// A page split into the rows to delete and the rows to upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyBatch {
    /// Ids of soft-deleted records.
    pub deletes: Vec<RowId>,
    /// Live records, as received.
    pub upserts: Vec<Row>,
}

impl ApplyBatch {
    /// Classifies validated records by their delete flag, keeping page order.
    pub fn classify(records: Vec<PulledRecord>) -> Self {
        let mut batch = Self::default();
        for record in records {
            if record.deleted {
                batch.deletes.push(record.id);
            } else {
                batch.upserts.push(record.row);
            }
        }
        batch
    }

    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.upserts.is_empty()
    }
}

/// What happened to a reconciled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The page was written to the local store.
    Applied {
        /// Rows deleted.
        deleted: usize,
        /// Rows upserted.
        upserted: usize,
    },
    /// The page touched rows with pending local mutations and was left
    /// unapplied.
    Skipped {
        /// Number of pending operations found.
        pending: usize,
    },
}

/// Decides whether a fetched page may be applied, and applies it.
///
/// # Invariants
///
/// - Every record of a page is validated before anything is written; one
///   bad record fails the whole page
/// - The pending log is consulted once per page; if any record of the page
///   has a pending mutation, no record of the page is applied
/// - Deletes are applied before upserts, under the store write gate
pub struct Reconciler<S: LocalStore, P: PendingLog> {
    store: Arc<S>,
    pending: Arc<P>,
    write_gate: Arc<Serializer>,
}

impl<S: LocalStore, P: PendingLog> Reconciler<S, P> {
    /// Creates a reconciler.
    pub fn new(store: Arc<S>, pending: Arc<P>, write_gate: Arc<Serializer>) -> Self {
        Self {
            store,
            pending,
            write_gate,
        }
    }

    /// Validates every row of a page.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PullError::InvalidRecord`] for a bad id and
    /// [`crate::PullError::DataIntegrity`] for a missing delete flag.
    pub fn validate_page(rows: Vec<Row>) -> PullResult<Vec<PulledRecord>> {
        rows.into_iter()
            .map(|row| PulledRecord::from_row(row).map_err(Into::into))
            .collect()
    }

    /// Reconciles and applies one page.
    ///
    /// # Errors
    ///
    /// Fails on invalid records (nothing is written), on pending-log
    /// errors, and on store errors. If the delete batch fails the upsert
    /// batch is not attempted.
    pub async fn reconcile(&self, table: &str, rows: Vec<Row>) -> PullResult<ReconcileOutcome> {
        let records = Self::validate_page(rows)?;
        let ids: Vec<RowId> = records.iter().map(|r| r.id.clone()).collect();

        let pending = self
            .pending
            .read_page_pending_operations(table, &ids)
            .await?;
        if !pending.is_empty() {
            warn!(
                table,
                pending = pending.len(),
                records = records.len(),
                "page has pending local mutations; not applied"
            );
            return Ok(ReconcileOutcome::Skipped {
                pending: pending.len(),
            });
        }

        let batch = ApplyBatch::classify(records);
        self.apply(table, &batch).await?;
        debug!(
            table,
            deleted = batch.deletes.len(),
            upserted = batch.upserts.len(),
            "applied page"
        );

        Ok(ReconcileOutcome::Applied {
            deleted: batch.deletes.len(),
            upserted: batch.upserts.len(),
        })
    }

    async fn apply(&self, table: &str, batch: &ApplyBatch) -> PullResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write_gate
            .run(async {
                if !batch.deletes.is_empty() {
                    self.store.delete(table, &batch.deletes).await?;
                }
                if !batch.upserts.is_empty() {
                    self.store.upsert(table, &batch.upserts).await?;
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PullError};
    use crate::pending::MemoryPendingLog;
    use serde_json::{json, Value};
    use tablesync_protocol::OperationKind;
    use tablesync_storage::{InMemoryStore, TableSchema};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    async fn setup() -> (
        Arc<InMemoryStore>,
        Arc<MemoryPendingLog>,
        Reconciler<InMemoryStore, MemoryPendingLog>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        store.define_table(&TableSchema::new("todo")).await.unwrap();
        let pending = Arc::new(MemoryPendingLog::new());
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&pending),
            Arc::new(Serializer::new("writes")),
        );
        (store, pending, reconciler)
    }

    #[test]
    fn classify_live_records_only_upserts() {
        let records = Reconciler::<InMemoryStore, MemoryPendingLog>::validate_page(vec![
            row(json!({"id": "a", "deleted": false})),
            row(json!({"id": "b", "deleted": false})),
        ])
        .unwrap();
        let batch = ApplyBatch::classify(records);

        assert!(batch.deletes.is_empty());
        assert_eq!(batch.upserts.len(), 2);
        assert_eq!(batch.upserts[0]["id"], json!("a"));
        assert_eq!(batch.upserts[1]["id"], json!("b"));
    }

    #[test]
    fn classify_splits_by_flag() {
        let records = Reconciler::<InMemoryStore, MemoryPendingLog>::validate_page(vec![
            row(json!({"id": "a", "deleted": true})),
            row(json!({"id": "b", "deleted": false})),
        ])
        .unwrap();
        let batch = ApplyBatch::classify(records);
        assert_eq!(batch.deletes, vec![RowId::from("a")]);
        assert_eq!(batch.upserts.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_applies_deletes_and_upserts() {
        let (store, _, reconciler) = setup().await;
        store
            .upsert("todo", &[row(json!({"id": "gone"}))])
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(
                "todo",
                vec![
                    row(json!({"id": "gone", "deleted": true})),
                    row(json!({"id": "new", "deleted": false, "title": "x"})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                deleted: 1,
                upserted: 1
            }
        );
        assert!(store.lookup("todo", &RowId::from("gone"), true).await.unwrap().is_none());
        assert!(store.lookup("todo", &RowId::from("new"), true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_delete_flag_fails_whole_page() {
        let (store, _, reconciler) = setup().await;
        let result = reconciler
            .reconcile(
                "todo",
                vec![
                    row(json!({"id": "a", "deleted": false})),
                    row(json!({"id": "b"})),
                ],
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert_eq!(store.row_count("todo"), 0);
    }

    #[tokio::test]
    async fn bad_id_fails_whole_page() {
        let (store, _, reconciler) = setup().await;
        let result = reconciler
            .reconcile(
                "todo",
                vec![
                    row(json!({"id": "a", "deleted": false})),
                    row(json!({"id": "", "deleted": false})),
                ],
            )
            .await;

        assert!(matches!(result, Err(PullError::InvalidRecord(_))));
        assert_eq!(store.row_count("todo"), 0);
    }

    /// One pending mutation anywhere in the page holds back every record
    /// of the page, including records without pending mutations.
    #[tokio::test]
    async fn any_pending_mutation_blocks_the_whole_page() {
        let (store, pending, reconciler) = setup().await;
        pending.record("todo", RowId::from("b"), OperationKind::Update);

        let outcome = reconciler
            .reconcile(
                "todo",
                vec![
                    row(json!({"id": "a", "deleted": false})),
                    row(json!({"id": "b", "deleted": false})),
                    row(json!({"id": "c", "deleted": true})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Skipped { pending: 1 });
        assert_eq!(store.row_count("todo"), 0);
    }

    #[tokio::test]
    async fn pending_mutations_on_other_tables_do_not_block() {
        let (store, pending, reconciler) = setup().await;
        pending.record("notes", RowId::from("a"), OperationKind::Update);

        let outcome = reconciler
            .reconcile("todo", vec![row(json!({"id": "a", "deleted": false}))])
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Applied { upserted: 1, .. }));
        assert_eq!(store.row_count("todo"), 1);
    }

    #[tokio::test]
    async fn delete_failure_skips_upserts() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::new(MemoryPendingLog::new()),
            Arc::new(Serializer::new("writes")),
        );

        // Table never defined: the delete batch fails first.
        let result = reconciler
            .reconcile(
                "todo",
                vec![
                    row(json!({"id": "a", "deleted": true})),
                    row(json!({"id": "b", "deleted": false})),
                ],
            )
            .await;
        assert!(matches!(result, Err(PullError::Storage(_))));
        assert_eq!(store.row_count("todo"), 0);
    }
}
