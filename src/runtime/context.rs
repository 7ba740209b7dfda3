//! Per-run shared state and task dispatch.

use crate::pool::{PoolTask, WorkerPool};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// State shared by every runtime node of one run.
pub(crate) struct RunContext {
    /// Run start instant; total timeouts are measured from here.
    pub(crate) t0: Instant,
    pool: Option<Arc<dyn WorkerPool>>,
    span: Span,
}

impl RunContext {
    pub(crate) fn new(pool: Option<Arc<dyn WorkerPool>>, node_count: usize) -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::debug_span!("dag_run", %run_id, nodes = node_count);
        Self {
            t0: Instant::now(),
            pool,
            span,
        }
    }

    /// Runs a task on the configured pool, or on a fresh unbounded
    /// tokio task when no pool was given.
    pub(crate) fn dispatch(&self, task: PoolTask) {
        let task = task.instrument(self.span.clone());
        match &self.pool {
            Some(pool) => pool.submit(Box::pin(task)),
            None => {
                tokio::spawn(task);
            }
        }
    }
}

/// Completion tracking for one run, by the sender-drop idiom: every
/// driver task owns a clone of the sender and the runner awaits
/// `recv() == None` once its own clone is dropped. Nothing is ever
/// sent; only the drop matters.
#[derive(Clone)]
pub(crate) struct TaskGuard {
    _tx: mpsc::UnboundedSender<()>,
}

pub(crate) fn completion_channel() -> (TaskGuard, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskGuard { _tx: tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_channel_releases_after_last_guard() {
        let (guard, mut rx) = completion_channel();
        let second = guard.clone();

        let waiter = tokio::spawn(async move { rx.recv().await });
        drop(guard);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(second);
        assert!(waiter.await.unwrap().is_none());
    }
}
