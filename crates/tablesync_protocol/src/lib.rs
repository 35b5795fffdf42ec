//! # tablesync Protocol
//!
//! Query, record and pending-operation types for tablesync.
//!
//! This crate provides:
//! - System column names and timestamp helpers
//! - Record id validation
//! - `Filter` expressions that can be evaluated and rendered
//! - `SyncQuery` (caller query) and `PageQuery` (one page of a pull)
//! - `PulledRecord`, the validated view of a remote row
//! - `PendingOperation` and the in-memory `OperationLog`
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod filter;
mod id;
mod pending;
mod query;
mod record;
pub mod system;

pub use error::{ProtocolError, ProtocolResult};
pub use filter::{CompareOp, Filter, Literal};
pub use id::{validate_record_id, MAX_ID_LENGTH};
pub use pending::{OperationKind, OperationLog, OplogEntry, PendingOperation};
pub use query::{OrderBy, PageQuery, ReadOptions, SortDirection, SyncQuery};
pub use record::PulledRecord;
