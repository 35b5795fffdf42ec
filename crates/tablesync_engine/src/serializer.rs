//! Run-one-at-a-time execution.

use std::future::Future;
use tokio::sync::Mutex;

/// Runs submitted futures strictly one after another.
///
/// A caller that submits while another future is running waits until that
/// future settles, success or failure. Waiters are admitted in arrival
/// order (tokio's mutex is fair).
///
/// The pull engine uses one serializer around `initialize` and `pull`, and
/// an independent one around each store mutation batch; the latter can be
/// shared with a push path so the two never interleave writes.
#[derive(Debug)]
pub struct Serializer {
    name: &'static str,
    lock: Mutex<()>,
}

impl Serializer {
    /// Creates a serializer. `name` only appears in trace output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(()),
        }
    }

    /// Runs `task` once every earlier submission has settled.
    pub async fn run<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.lock.lock().await;
        tracing::trace!(serializer = self.name, "running task");
        task.await
    }

    /// Returns true if a task is currently running.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
