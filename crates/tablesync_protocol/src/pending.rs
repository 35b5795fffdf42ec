//! Local pending mutations.

use std::collections::{HashSet, VecDeque};
use tablesync_storage::RowId;

/// What a pending mutation does to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Row was created locally.
    Insert,
    /// Row was changed locally.
    Update,
    /// Row was deleted locally.
    Delete,
}

/// A local change that has not been pushed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Operation id, assigned by the log.
    pub op_id: u64,
    /// Table of the changed row.
    pub table: String,
    /// Id of the changed row.
    pub row_id: RowId,
    /// Kind of change.
    pub kind: OperationKind,
}

/// An entry in the operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OplogEntry {
    /// The operation.
    pub operation: PendingOperation,
    /// Whether the push path has had the operation accepted by the server.
    pub acknowledged: bool,
}

/// An ordered log of local mutations awaiting push.
///
/// # Invariants
///
/// - Operations are kept in the order they were recorded
/// - Operation ids are assigned by the log and strictly increase
/// - Acknowledged operations are no longer pending and can be compacted
#[derive(Debug)]
pub struct OperationLog {
    entries: VecDeque<OplogEntry>,
    next_op_id: u64,
    last_acked_op_id: u64,
}

impl OperationLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_op_id: 1,
            last_acked_op_id: 0,
        }
    }

    /// Records a local mutation. Returns the assigned operation id.
    pub fn append(&mut self, table: impl Into<String>, row_id: RowId, kind: OperationKind) -> u64 {
        let op_id = self.next_op_id;
        self.next_op_id += 1;
        self.entries.push_back(OplogEntry {
            operation: PendingOperation {
                op_id,
                table: table.into(),
                row_id,
                kind,
            },
            acknowledged: false,
        });
        op_id
    }

    /// Returns pending (unacknowledged) operations in order.
    pub fn pending(&self) -> impl Iterator<Item = &PendingOperation> {
        self.entries
            .iter()
            .filter(|e| !e.acknowledged)
            .map(|e| &e.operation)
    }

    /// Returns the pending operations on `table` touching any of `ids`.
    pub fn pending_for_page(&self, table: &str, ids: &[RowId]) -> Vec<&PendingOperation> {
        let ids: HashSet<&RowId> = ids.iter().collect();
        self.pending()
            .filter(|op| op.table == table && ids.contains(&op.row_id))
            .collect()
    }

    /// Returns the number of pending operations.
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Acknowledges operations up to and including `op_id`.
    pub fn acknowledge_up_to(&mut self, op_id: u64) {
        for entry in &mut self.entries {
            if entry.operation.op_id <= op_id {
                entry.acknowledged = true;
            }
        }
        self.last_acked_op_id = self.last_acked_op_id.max(op_id);
    }

    /// Returns the last acknowledged operation id.
    pub fn last_acked_op_id(&self) -> u64 {
        self.last_acked_op_id
    }

    /// Drops acknowledged entries from the front of the log.
    pub fn compact(&mut self) {
        while self.entries.front().is_some_and(|e| e.acknowledged) {
            self.entries.pop_front();
        }
    }

    /// Returns the total number of entries, acknowledged or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}
