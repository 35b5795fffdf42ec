//! A remote source that replays queued responses.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tablesync_engine::{PullError, PullResult, RemoteSource};
use tablesync_protocol::{PageQuery, ReadOptions};
use tablesync_storage::Row;

/// A remote source answering reads from a queue.
///
/// Each read pops the next queued response, whatever the query asks for.
/// Once the queue is empty every read returns an empty page. Every query is
/// recorded so tests can check the cursor and offset the engine sent.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    responses: Mutex<VecDeque<PullResult<Vec<Row>>>>,
    queries: Mutex<Vec<(PageQuery, ReadOptions)>>,
}

impl ScriptedRemote {
    /// Creates a remote with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote that replays `pages` in order.
    pub fn with_pages<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = Vec<Row>>,
    {
        let remote = Self::new();
        for page in pages {
            remote.push_page(page);
        }
        remote
    }

    /// Queues a page.
    pub fn push_page(&self, rows: Vec<Row>) {
        self.responses.lock().push_back(Ok(rows));
    }

    /// Queues a failed read.
    pub fn push_error(&self, error: PullError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Returns the page queries received so far.
    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().iter().map(|(q, _)| q.clone()).collect()
    }

    /// Returns the read options received so far.
    pub fn options(&self) -> Vec<ReadOptions> {
        self.queries.lock().iter().map(|(_, o)| *o).collect()
    }

    /// Returns the number of reads received so far.
    pub fn read_count(&self) -> usize {
        self.queries.lock().len()
    }

    /// Returns the number of responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn read(&self, query: &PageQuery, options: &ReadOptions) -> PullResult<Vec<Row>> {
        self.queries.lock().push((query.clone(), *options));
        self.responses.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
