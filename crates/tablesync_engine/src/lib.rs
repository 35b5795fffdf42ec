//! # tablesync engine
//!
//! Incremental pull synchronization for tablesync.
//!
//! This crate provides:
//! - Query validation and page query construction
//! - Checkpoint persistence per pull identity
//! - Reconciliation of fetched pages against pending local mutations
//! - The pull loop and its serializer
//! - Collaborator traits for the remote source and the pending log, with
//!   in-memory implementations
//!
//! ## Architecture
//!
//! A pull walks a remote table in change-timestamp order:
//! 1. Load the identity's checkpoint (or start from the beginning of time)
//! 2. Fetch a page of rows changed at or after the cursor, deleted rows included
//! 3. Skip the page if any of its rows has a pending local mutation,
//!    otherwise apply its deletes then its upserts
//! 4. Save the page's high-water-mark and move the cursor
//! 5. Stop on the first empty page
//!
//! Rows sharing a timestamp across a page boundary are walked with an
//! offset at a fixed cursor, so none are skipped and the loop never spins
//! on one instant.
//!
//! ## Key Invariants
//!
//! - The remote source is authoritative, except over rows with pending
//!   local mutations
//! - At most one pull runs per client
//! - The checkpoint never moves backwards within a pull
//! - Vanilla pulls (no identity) never touch checkpoint storage

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod client;
mod config;
mod error;
mod page;
mod pending;
mod pull;
mod reconcile;
mod remote;
mod serializer;
mod state;
mod validator;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use client::PullClient;
pub use config::{
    EngineConfig, PullSettings, DEFAULT_CHECKPOINT_TABLE, DEFAULT_MAX_IDENTITY_LEN,
    DEFAULT_PAGE_SIZE,
};
pub use error::{ErrorKind, PullError, PullResult};
pub use page::{CursorMove, PageQueryBuilder};
pub use pending::{MemoryPendingLog, PendingLog};
pub use pull::page_high_water;
pub use reconcile::{ApplyBatch, ReconcileOutcome, Reconciler};
pub use remote::{MemoryRemote, RemoteSource};
pub use serializer::Serializer;
pub use state::{PullPhase, PullStats, PullSummary};
pub use validator::{validate_identity, validate_query};
