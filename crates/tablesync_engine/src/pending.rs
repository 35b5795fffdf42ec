//! Pending-mutation log abstraction.

use crate::error::PullResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use tablesync_protocol::{OperationKind, OperationLog, PendingOperation};
use tablesync_storage::RowId;

/// The local log of mutations not yet pushed.
///
/// Pull only asks which rows of a page have outstanding mutations; it never
/// reads their content.
#[async_trait]
pub trait PendingLog: Send + Sync {
    /// Returns pending operations on `table` touching any of `ids`.
    async fn read_page_pending_operations(
        &self,
        table: &str,
        ids: &[RowId],
    ) -> PullResult<Vec<PendingOperation>>;
}

/// An in-memory pending log backed by an [`OperationLog`].
#[derive(Debug, Default)]
pub struct MemoryPendingLog {
    log: RwLock<OperationLog>,
}

impl MemoryPendingLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a local mutation. Returns its operation id.
    pub fn record(&self, table: &str, row_id: RowId, kind: OperationKind) -> u64 {
        self.log.write().append(table, row_id, kind)
    }

    /// Marks operations up to `op_id` as pushed and drops them.
    pub fn acknowledge_up_to(&self, op_id: u64) {
        let mut log = self.log.write();
        log.acknowledge_up_to(op_id);
        log.compact();
    }

    /// Returns the number of operations still pending.
    pub fn pending_count(&self) -> usize {
        self.log.read().pending_count()
    }
}

#[async_trait]
impl PendingLog for MemoryPendingLog {
    async fn read_page_pending_operations(
        &self,
        table: &str,
        ids: &[RowId],
    ) -> PullResult<Vec<PendingOperation>> {
        Ok(self
            .log
            .read()
            .pending_for_page(table, ids)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pending_log_lookup() {
        let log = MemoryPendingLog::new();
        let op = log.record("todo", RowId::from("a"), OperationKind::Update);
        log.record("todo", RowId::from("b"), OperationKind::Insert);

        let found = log
            .read_page_pending_operations("todo", &[RowId::from("a"), RowId::from("c")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].op_id, op);

        log.acknowledge_up_to(op);
        assert_eq!(log.pending_count(), 1);
        assert!(log
            .read_page_pending_operations("todo", &[RowId::from("a")])
            .await
            .unwrap()
            .is_empty());
    }
}
