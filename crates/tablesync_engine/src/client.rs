//! The caller-facing pull client.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{EngineConfig, PullSettings};
use crate::error::PullResult;
use crate::pending::PendingLog;
use crate::pull::PullLoop;
use crate::reconcile::Reconciler;
use crate::remote::RemoteSource;
use crate::serializer::Serializer;
use crate::state::{PullPhase, PullStats, PullSummary};
use crate::validator::{validate_identity, validate_query};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tablesync_protocol::{system, SyncQuery};
use tablesync_storage::LocalStore;
use tracing::{error, info, info_span, Instrument};

/// Pulls remote tables into a local store, incrementally.
///
/// # Example
///
/// ```rust,ignore
/// let client = PullClient::new(EngineConfig::default(), store, remote, pending)?;
/// client.initialize().await?;
///
/// let query = SyncQuery::new("todo").with_filter(Filter::eq("owner", "me"));
/// let summary = client.pull(&query, Some("my-todos"), PullSettings::default()).await?;
/// println!("upserted {} records", summary.upserted);
/// ```
///
/// `initialize`, `pull` and the checkpoint accessors share one serializer:
/// at most one of them runs at any time, the rest queue in arrival order.
/// Store writes made by pull go through a separate write gate, which a push
/// path may share via [`PullClient::with_write_gate`].
pub struct PullClient<S: LocalStore, R: RemoteSource, P: PendingLog> {
    config: EngineConfig,
    store: Arc<S>,
    remote: Arc<R>,
    pending: Arc<P>,
    checkpoints: CheckpointStore<S>,
    pull_gate: Serializer,
    write_gate: Arc<Serializer>,
    initialized: AtomicBool,
    phase: RwLock<PullPhase>,
    stats: RwLock<PullStats>,
}

impl<S: LocalStore, R: RemoteSource, P: PendingLog> PullClient<S, R, P> {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PullError::InvalidSettings`] if `config` is invalid.
    pub fn new(
        config: EngineConfig,
        store: Arc<S>,
        remote: Arc<R>,
        pending: Arc<P>,
    ) -> PullResult<Self> {
        config.validate()?;
        let checkpoints = CheckpointStore::new(Arc::clone(&store), config.checkpoint_table.clone());
        Ok(Self {
            config,
            store,
            remote,
            pending,
            checkpoints,
            pull_gate: Serializer::new("pull"),
            write_gate: Arc::new(Serializer::new("store-writes")),
            initialized: AtomicBool::new(false),
            phase: RwLock::new(PullPhase::Idle),
            stats: RwLock::new(PullStats::default()),
        })
    }

    /// Replaces the store write gate, typically with one shared by a push
    /// path writing to the same store.
    pub fn with_write_gate(mut self, gate: Arc<Serializer>) -> Self {
        self.write_gate = gate;
        self
    }

    /// Returns the store write gate.
    pub fn write_gate(&self) -> Arc<Serializer> {
        Arc::clone(&self.write_gate)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the current phase.
    pub fn phase(&self) -> PullPhase {
        *self.phase.read()
    }

    /// Gets the cumulative stats.
    pub fn stats(&self) -> PullStats {
        self.stats.read().clone()
    }

    /// Provisions checkpoint storage. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the checkpoint table cannot be defined.
    pub async fn initialize(&self) -> PullResult<()> {
        self.pull_gate.run(self.ensure_initialized()).await
    }

    async fn ensure_initialized(&self) -> PullResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.checkpoints.initialize().await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!(table = %self.config.checkpoint_table, "checkpoint storage ready");
        Ok(())
    }

    /// Pulls every record of `query` changed since the identity's checkpoint.
    ///
    /// With `identity` absent the pull is a one-shot pull from the beginning
    /// of time and no checkpoint is read or written. The query is copied
    /// before the pull starts.
    ///
    /// # Errors
    ///
    /// Validation errors (query shape, identity, page size) are returned
    /// before any I/O. Errors during the pull abort it; everything up to the
    /// last checkpointed page stays applied, and re-invoking `pull` with the
    /// same identity resumes from there.
    pub async fn pull(
        &self,
        query: &SyncQuery,
        identity: Option<&str>,
        settings: PullSettings,
    ) -> PullResult<PullSummary> {
        let query = query.clone();
        validate_query(&query)?;
        validate_identity(identity, self.config.max_identity_len)?;
        let page_size = settings.resolve_page_size(self.config.default_page_size)?;

        let span = info_span!(
            "pull",
            table = %query.table,
            identity = identity.unwrap_or("<vanilla>"),
            page_size,
        );
        self.pull_gate
            .run(self.run_pull(&query, identity, page_size))
            .instrument(span)
            .await
    }

    async fn run_pull(
        &self,
        query: &SyncQuery,
        identity: Option<&str>,
        page_size: u32,
    ) -> PullResult<PullSummary> {
        let result = async {
            self.ensure_initialized().await?;
            let session = PullLoop {
                remote: self.remote.as_ref(),
                checkpoints: &self.checkpoints,
                reconciler: Reconciler::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.pending),
                    Arc::clone(&self.write_gate),
                ),
                phase: &self.phase,
            };
            session.run(query, identity, page_size).await
        }
        .await;

        match &result {
            Ok(summary) => {
                self.stats.write().record_success(summary);
                info!(
                    pages = summary.pages_fetched,
                    skipped = summary.pages_skipped,
                    upserted = summary.upserted,
                    deleted = summary.deleted,
                    high_water_mark = %summary
                        .high_water_mark
                        .as_ref()
                        .map(system::format_timestamp)
                        .unwrap_or_default(),
                    elapsed_ms = summary.duration.as_millis() as u64,
                    "pull complete"
                );
            }
            Err(e) => {
                *self.phase.write() = PullPhase::Failed;
                self.stats.write().record_failure(&e.to_string());
                error!(error = %e, retryable = e.is_retryable(), "pull failed");
            }
        }
        result
    }

    /// Reads the stored checkpoint of an identity.
    ///
    /// # Errors
    ///
    /// Fails on an invalid identity, on storage errors and on a malformed
    /// checkpoint row.
    pub async fn checkpoint(&self, identity: &str) -> PullResult<Option<Checkpoint>> {
        validate_identity(Some(identity), self.config.max_identity_len)?;
        self.pull_gate
            .run(async {
                self.ensure_initialized().await?;
                self.checkpoints.get(identity).await
            })
            .await
    }

    /// Deletes the checkpoint of an identity, so its next pull starts from
    /// the beginning of time.
    ///
    /// # Errors
    ///
    /// Fails on an invalid identity or on storage errors.
    pub async fn reset_checkpoint(&self, identity: &str) -> PullResult<()> {
        validate_identity(Some(identity), self.config.max_identity_len)?;
        self.pull_gate
            .run(async {
                self.ensure_initialized().await?;
                self.checkpoints.remove(identity).await?;
                info!(identity, "checkpoint reset");
                Ok(())
            })
            .await
    }
}
