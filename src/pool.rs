//! Worker pools for bounded task dispatch.
//!
//! A run without a pool spawns one unbounded tokio task per runnable
//! node. Handing a [`WorkerPool`] to
//! [`Dag::run_with_pool`](crate::graph::Dag::run_with_pool) caps
//! concurrency instead; the engine only ever calls [`WorkerPool::submit`],
//! so any dispatch policy can be plugged in.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A unit of work submitted to a pool.
pub type PoolTask = BoxFuture<'static, ()>;

/// Capability to run submitted tasks.
///
/// Implementations must be reentrant: a task submitting further tasks
/// must not deadlock with its own worker slot. Note the caveat on
/// [`FifoPool`] about timeouts and single-worker pools.
pub trait WorkerPool: Send + Sync {
    /// Accepts a task for eventual execution.
    fn submit(&self, task: PoolTask);
}

struct PoolState {
    queue: VecDeque<PoolTask>,
    workers: usize,
}

struct PoolInner {
    max_workers: usize,
    state: Mutex<PoolState>,
}

/// Bounded FIFO worker pool.
///
/// At most `max_workers` tasks run concurrently; excess submissions
/// queue in FIFO order. A worker that drains the queue exits, and a
/// later submission spawns a fresh one.
///
/// Timed-out nodes dispatch their inner task through the pool as well,
/// so a pool of one worker deadlocks when any node in the graph has a
/// timeout configured: the driver occupies the only slot while it
/// waits for the inner task. Size pools accordingly.
#[derive(Clone)]
pub struct FifoPool {
    inner: Arc<PoolInner>,
}

impl FifoPool {
    /// Creates a pool running at most `max_workers` concurrent tasks.
    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                max_workers: max_workers.max(1),
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                }),
            }),
        }
    }

    /// Number of tasks currently queued behind busy workers.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    async fn work(inner: Arc<PoolInner>, first: PoolTask) {
        let mut task = first;
        loop {
            task.await;
            let next = {
                let mut state = inner.state.lock();
                match state.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        state.workers -= 1;
                        return;
                    }
                }
            };
            task = next;
        }
    }
}

impl WorkerPool for FifoPool {
    fn submit(&self, task: PoolTask) {
        let mut state = self.inner.state.lock();
        if state.workers < self.inner.max_workers {
            state.workers += 1;
            drop(state);
            tokio::spawn(Self::work(self.inner.clone(), task));
        } else {
            state.queue.push_back(task);
        }
    }
}
