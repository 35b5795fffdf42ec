//! Pull phases, statistics and summaries.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// The phase the pull engine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPhase {
    /// No pull is running.
    Idle,
    /// Loading the checkpoint and building the first page.
    Initializing,
    /// Waiting on the remote source for a page.
    FetchingPage,
    /// Checking a page against pending mutations and applying it.
    Reconciling,
    /// Persisting the page's high-water-mark.
    Checkpointing,
    /// An empty page was observed; the pull finished.
    Complete,
    /// The last pull aborted with an error.
    Failed,
}

impl PullPhase {
    /// Returns true while a pull is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PullPhase::Initializing
                | PullPhase::FetchingPage
                | PullPhase::Reconciling
                | PullPhase::Checkpointing
        )
    }
}

/// Cumulative statistics across pulls.
#[derive(Debug, Clone, Default)]
pub struct PullStats {
    /// Pulls that ran to completion.
    pub pulls_completed: u64,
    /// Pulls that aborted with an error.
    pub pulls_failed: u64,
    /// Pages fetched, including the final empty page of each pull.
    pub pages_fetched: u64,
    /// Pages left unapplied because of pending local mutations.
    pub pages_skipped: u64,
    /// Records upserted into the local store.
    pub records_upserted: u64,
    /// Records deleted from the local store.
    pub records_deleted: u64,
    /// When the last pull completed.
    pub last_pull_time: Option<Instant>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

impl PullStats {
    pub(crate) fn record_success(&mut self, summary: &PullSummary) {
        self.pulls_completed += 1;
        self.pages_fetched += summary.pages_fetched;
        self.pages_skipped += summary.pages_skipped;
        self.records_upserted += summary.upserted;
        self.records_deleted += summary.deleted;
        self.last_pull_time = Some(Instant::now());
        self.last_error = None;
    }

    pub(crate) fn record_failure(&mut self, error: &str) {
        self.pulls_failed += 1;
        self.last_error = Some(error.to_string());
    }
}

/// Result of one successful pull.
#[derive(Debug, Clone, PartialEq)]
pub struct PullSummary {
    /// Pulled table.
    pub table: String,
    /// Pages fetched, including the final empty page.
    pub pages_fetched: u64,
    /// Pages left unapplied because of pending local mutations.
    pub pages_skipped: u64,
    /// Records upserted.
    pub upserted: u64,
    /// Records deleted.
    pub deleted: u64,
    /// Highest change timestamp observed, if any record was fetched.
    pub high_water_mark: Option<DateTime<Utc>>,
    /// Wall time spent.
    pub duration: Duration,
}

impl PullSummary {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            pages_fetched: 0,
            pages_skipped: 0,
            upserted: 0,
            deleted: 0,
            high_water_mark: None,
            duration: Duration::ZERO,
        }
    }
}
