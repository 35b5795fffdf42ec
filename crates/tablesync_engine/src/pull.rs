//! The pull loop.
//!
//! One [`PullLoop::run`] call is one pull session: it loads the checkpoint,
//! then fetches, reconciles and checkpoints page after page until the remote
//! source answers with an empty page.

use crate::checkpoint::CheckpointStore;
use crate::error::{PullError, PullResult};
use crate::page::{CursorMove, PageQueryBuilder};
use crate::pending::PendingLog;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::remote::RemoteSource;
use crate::state::{PullPhase, PullSummary};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Instant;
use tablesync_protocol::{system, ReadOptions, SyncQuery};
use tablesync_storage::{LocalStore, Row};
use tracing::debug;

/// Returns the high-water-mark of a non-empty page: the change timestamp of
/// its last record.
///
/// # Errors
///
/// Returns [`PullError::DataIntegrity`] if the page is empty, if the last
/// record's change timestamp is missing or malformed, or if it lies before
/// `cursor` (the page filter guarantees it cannot).
pub fn page_high_water(rows: &[Row], cursor: DateTime<Utc>) -> PullResult<DateTime<Utc>> {
    let last = rows
        .last()
        .ok_or_else(|| PullError::DataIntegrity("empty page has no high-water-mark".into()))?;
    let updated_at = system::updated_at(last)?;
    if updated_at < cursor {
        return Err(PullError::DataIntegrity(format!(
            "last record changed at {} which is before the cursor {}",
            system::format_timestamp(&updated_at),
            system::format_timestamp(&cursor),
        )));
    }
    Ok(updated_at)
}

/// Collaborators borrowed by one pull session.
pub(crate) struct PullLoop<'a, S: LocalStore, R: RemoteSource, P: PendingLog> {
    pub(crate) remote: &'a R,
    pub(crate) checkpoints: &'a CheckpointStore<S>,
    pub(crate) reconciler: Reconciler<S, P>,
    pub(crate) phase: &'a RwLock<PullPhase>,
}

impl<S: LocalStore, R: RemoteSource, P: PendingLog> PullLoop<'_, S, R, P> {
    fn set_phase(&self, phase: PullPhase) {
        *self.phase.write() = phase;
    }

    /// Runs the session to completion or to the first error.
    ///
    /// The query must already be validated. Nothing is retried; on error
    /// the last saved checkpoint is where the next pull resumes.
    pub(crate) async fn run(
        &self,
        query: &SyncQuery,
        identity: Option<&str>,
        page_size: u32,
    ) -> PullResult<PullSummary> {
        let started = Instant::now();
        let mut summary = PullSummary::new(&query.table);

        self.set_phase(PullPhase::Initializing);
        let cursor = self.checkpoints.load(identity).await?;
        let builder = PageQueryBuilder::new(query, page_size);
        let mut page = builder.build(cursor);
        let options = ReadOptions::including_deleted();

        loop {
            self.set_phase(PullPhase::FetchingPage);
            let rows = self.remote.read(&page, &options).await?;
            summary.pages_fetched += 1;
            debug!(
                cursor = %system::format_timestamp(&page.cursor),
                skip = page.skip,
                records = rows.len(),
                "fetched page"
            );

            // Only an empty page ends the pull; a short page may just mean
            // the server caps its page size below ours.
            if rows.is_empty() {
                break;
            }

            let fetched = rows.len();
            let high_water = page_high_water(&rows, page.cursor)?;

            self.set_phase(PullPhase::Reconciling);
            match self.reconciler.reconcile(&query.table, rows).await? {
                ReconcileOutcome::Applied { deleted, upserted } => {
                    summary.deleted += deleted as u64;
                    summary.upserted += upserted as u64;
                }
                ReconcileOutcome::Skipped { .. } => summary.pages_skipped += 1,
            }

            self.set_phase(PullPhase::Checkpointing);
            self.checkpoints
                .save(identity, &query.table, high_water)
                .await?;
            summary.high_water_mark = Some(high_water);

            if builder.advance(&mut page, high_water, fetched) == CursorMove::Skipped {
                debug!(skip = page.skip, "page ended on the cursor instant");
            }
        }

        self.set_phase(PullPhase::Complete);
        summary.duration = started.elapsed();
        Ok(summary)
    }
}
