//! Per-run node state machine.
//!
//! One [`RuntimeNode`] exists per metadata node per run. It owns the
//! status atomic, the dependency-arrival counter, the retry loop, and
//! the timeout interlock; [`NodeHandle`] is the narrow capability
//! surface handed to processors and hooks.
//!
//! Timeouts are cooperative. The deadline watcher can flip a node to
//! `Failed`, after which `do_if_running` bodies stop executing and no
//! further attempts start, but user code already past the gate keeps
//! running; only its return value is ignored.

use crate::core::{NodeResult, NodeStatus};
use crate::errors::NodeError;
use crate::node::NodeMetadata;
use crate::runtime::context::{RunContext, TaskGuard};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Timing state guarded by the interlock lock.
#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    /// When the node actually began executing.
    begin: Option<Instant>,
    /// Effective deadline, min of the local and remaining-total
    /// budgets, computed once at begin.
    ddl: Option<Instant>,
}

pub(crate) struct RuntimeNode<T> {
    meta: Arc<NodeMetadata<T>>,
    ctx: Arc<RunContext>,
    status: AtomicU8,
    done_deps: AtomicU32,
    children: OnceLock<Vec<Arc<RuntimeNode<T>>>>,
    weak_children: OnceLock<Vec<Arc<RuntimeNode<T>>>>,
    /// One-shot completion signal raced by the deadline watcher.
    done: Notify,
    /// Set (after `cost` is stored) when the done signal fires.
    finished: AtomicBool,
    err: Mutex<Option<Arc<NodeError>>>,
    /// The timeout interlock. Read side: `do_if_running` (status check
    /// plus user fn under the guard) and timing reads. Write side: the
    /// worker publishing `begin`/`ddl`, and the watcher flipping
    /// Running -> Failed at the deadline. A user fn admitted by the
    /// read guard therefore always runs to completion before the flip.
    interlock: RwLock<Timing>,
    /// Final cost in nanoseconds; valid once `finished` is set.
    cost: AtomicU64,
    attempts: AtomicU32,
}

impl<T> RuntimeNode<T> {
    pub(crate) fn new(meta: Arc<NodeMetadata<T>>, ctx: Arc<RunContext>) -> Arc<Self> {
        Arc::new(Self {
            meta,
            ctx,
            status: AtomicU8::new(NodeStatus::Waiting.as_u8()),
            done_deps: AtomicU32::new(0),
            children: OnceLock::new(),
            weak_children: OnceLock::new(),
            done: Notify::new(),
            finished: AtomicBool::new(false),
            err: Mutex::new(None),
            interlock: RwLock::new(Timing::default()),
            cost: AtomicU64::new(0),
            attempts: AtomicU32::new(0),
        })
    }

    /// Links this node to its sibling runtime nodes. Called exactly
    /// once, before any root is fired.
    pub(crate) fn wire(
        &self,
        children: Vec<Arc<RuntimeNode<T>>>,
        weak_children: Vec<Arc<RuntimeNode<T>>>,
    ) {
        let _ = self.children.set(children);
        let _ = self.weak_children.set(weak_children);
    }

    pub(crate) fn name(&self) -> &str {
        &self.meta.name
    }

    pub(crate) fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn transition(&self, from: NodeStatus, to: NodeStatus) -> bool {
        self.status
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Runs `f` only while the node is still `Running`, mutually
    /// exclusive with the deadline flip.
    pub(crate) fn do_if_running(&self, f: impl FnOnce()) -> bool {
        let _guard = self.interlock.read();
        if self.status() != NodeStatus::Running {
            return false;
        }
        f();
        true
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.interlock.read().ddl
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn cost(&self) -> Duration {
        let timing = self.interlock.read();
        self.cost_with(&timing)
    }

    fn cost_with(&self, timing: &Timing) -> Duration {
        if self.finished.load(Ordering::SeqCst) {
            Duration::from_nanos(self.cost.load(Ordering::SeqCst))
        } else {
            timing.begin.map_or(Duration::ZERO, |begin| begin.elapsed())
        }
    }

    pub(crate) fn result(&self) -> NodeResult {
        let timing = self.interlock.read();
        NodeResult {
            status: self.status(),
            err: self.err.lock().clone(),
            begin: timing.begin,
            cost: self.cost_with(&timing),
            attempts: self.attempts(),
        }
    }
}

impl<T: Send + Sync + 'static> RuntimeNode<T> {
    /// Records one finished dependency. The arrival that completes the
    /// count fires the node; strong parents call this only on success,
    /// weak parents always.
    pub(crate) fn on_dep_done(self: &Arc<Self>, params: &Arc<T>, guard: &TaskGuard) {
        if self.done_deps.fetch_add(1, Ordering::SeqCst) + 1 == self.meta.dep_count {
            self.start(params, guard);
        }
    }

    /// Fires the node if it has not been fired yet.
    pub(crate) fn start(self: &Arc<Self>, params: &Arc<T>, guard: &TaskGuard) {
        if !self.transition(NodeStatus::Waiting, NodeStatus::Running) {
            return;
        }
        debug!(node = %self.meta.name, "node started");
        let node = self.clone();
        let params = params.clone();
        let guard = guard.clone();
        self.ctx.dispatch(Box::pin(async move {
            node.run(params, guard).await;
        }));
    }

    /// Driver body: executes the node, then notifies children. The
    /// guard is released when this returns, which is what the runner's
    /// completion channel counts.
    async fn run(self: &Arc<Self>, params: Arc<T>, guard: TaskGuard) {
        let expired = self
            .meta
            .total_timeout
            .is_some_and(|total| Instant::now() > self.ctx.t0 + total);
        if expired {
            warn!(node = %self.meta.name, "total timeout elapsed before start");
            self.fail(&params, NodeError::Timeout);
        } else if self.meta.processor.is_none() {
            self.succeed(&params);
        } else if self.meta.local_timeout.is_none() && self.meta.total_timeout.is_none() {
            self.process_without_timeout(&params).await;
        } else {
            self.process_with_timeout(&params).await;
        }

        if self.status() == NodeStatus::Succeeded {
            for child in self.children.get().into_iter().flatten() {
                child.on_dep_done(&params, &guard);
            }
        }
        for child in self.weak_children.get().into_iter().flatten() {
            child.on_dep_done(&params, &guard);
        }
    }

    async fn process_without_timeout(self: &Arc<Self>, params: &Arc<T>) {
        self.interlock.write().begin = Some(Instant::now());
        self.process_with_retry(params).await;
    }

    /// Dispatches the processor as an inner task and supervises it
    /// from here, racing the done signal against the deadline. The
    /// deadline is computed when the inner task actually starts, so
    /// pool queueing does not consume the local budget.
    async fn process_with_timeout(self: &Arc<Self>, params: &Arc<T>) {
        let (started_tx, started_rx) = oneshot::channel();
        let node = self.clone();
        let inner_params = params.clone();
        self.ctx.dispatch(Box::pin(async move {
            let begin = Instant::now();
            let local = node.meta.local_timeout.map(|d| begin + d);
            let total = node.meta.total_timeout.map(|d| node.ctx.t0 + d);
            let ddl = match (local, total) {
                (Some(l), Some(t)) => l.min(t),
                (Some(l), None) => l,
                (None, Some(t)) => t,
                // unreachable: this path is only taken with a timeout set
                (None, None) => begin,
            };
            {
                let mut timing = node.interlock.write();
                timing.begin = Some(begin);
                timing.ddl = Some(ddl);
            }
            let _ = started_tx.send(ddl);
            node.process_with_retry(&inner_params).await;
        }));

        // The handshake guarantees begin/ddl are published before the
        // race below starts.
        let Ok(ddl) = started_rx.await else {
            return;
        };
        tokio::select! {
            () = self.done.notified() => {}
            () = tokio::time::sleep_until(ddl) => {
                let flipped = {
                    let _guard = self.interlock.write();
                    self.transition(NodeStatus::Running, NodeStatus::Failed)
                };
                if flipped {
                    warn!(node = %self.meta.name, "node timed out");
                    self.record_failure(params, NodeError::Timeout);
                }
            }
        }
    }

    /// Runs the attempt loop, then stores the final cost, signals
    /// done, and attempts the terminal transition. If the watcher
    /// already flipped the node to Failed(Timeout), the transition
    /// here is a no-op and the timeout error is preserved.
    async fn process_with_retry(self: &Arc<Self>, params: &Arc<T>) {
        let outcome = self.run_attempts(params).await;

        let begin = self.interlock.read().begin;
        let cost = begin.map_or(Duration::ZERO, |b| b.elapsed());
        self.cost.store(cost.as_nanos().min(u128::from(u64::MAX)) as u64, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
        self.done.notify_one();

        match outcome {
            Ok(()) => self.succeed(params),
            Err(err) => self.fail(params, err),
        }
    }

    async fn run_attempts(self: &Arc<Self>, params: &Arc<T>) -> Result<(), NodeError> {
        let max_attempts = self.meta.max_attempts.max(1);
        loop {
            let admitted = self.do_if_running(|| {
                self.attempts.fetch_add(1, Ordering::SeqCst);
            });
            if !admitted {
                // deadline fired between attempts
                return Err(NodeError::Timeout);
            }
            let attempt = self.attempts();
            match self.invoke_processor(params).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    debug!(node = %self.meta.name, attempt, error = %err, "attempt failed");
                    if let Some(backoff) = self.meta.backoff.as_ref() {
                        // skip the sleep if the deadline already fired
                        if self.status() != NodeStatus::Running {
                            return Err(err);
                        }
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
            }
        }
    }

    async fn invoke_processor(self: &Arc<Self>, params: &Arc<T>) -> Result<(), NodeError> {
        let Some(processor) = self.meta.processor.as_ref() else {
            return Ok(());
        };
        let fut = processor(NodeHandle::new(self.clone()), params.clone());
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(NodeError::Processor(err)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(node = %self.meta.name, %message, "recovered processor panic");
                Err(NodeError::Panic {
                    node: self.meta.name.clone(),
                    message,
                })
            }
        }
    }

    fn succeed(self: &Arc<Self>, params: &Arc<T>) {
        if !self.transition(NodeStatus::Running, NodeStatus::Succeeded) {
            return;
        }
        debug!(node = %self.meta.name, attempts = self.attempts(), "node succeeded");
        if let Some(hook) = self.meta.on_success.as_ref() {
            hook(&NodeHandle::new(self.clone()), params);
        }
    }

    fn fail(self: &Arc<Self>, params: &Arc<T>, err: NodeError) {
        if !self.transition(NodeStatus::Running, NodeStatus::Failed) {
            return;
        }
        self.record_failure(params, err);
    }

    /// Error recording and hook dispatch after a successful Failed
    /// transition. Runs outside the interlock so a hook may call back
    /// into the handle.
    fn record_failure(self: &Arc<Self>, params: &Arc<T>, err: NodeError) {
        warn!(node = %self.meta.name, error = %err, "node failed");
        *self.err.lock() = Some(Arc::new(err));
        if let Some(hook) = self.meta.on_failure.as_ref() {
            hook(&NodeHandle::new(self.clone()), params);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The capability surface the engine passes to processors and hooks.
///
/// Cheap to clone; all methods are safe to call from any task.
pub struct NodeHandle<T> {
    node: Arc<RuntimeNode<T>>,
}

impl<T> NodeHandle<T> {
    pub(crate) fn new(node: Arc<RuntimeNode<T>>) -> Self {
        Self { node }
    }

    /// The node's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Runs `f` only if the node has not timed out, returning whether
    /// it ran. An admitted `f` completes before any timeout
    /// transition: writes to the shared parameter made here can never
    /// race the deadline flip of this node.
    ///
    /// The guard is deliberately narrow. It serializes `f` against
    /// this node's timeout only; concurrent access to the shared
    /// parameter from other nodes is the caller's concern.
    pub fn do_if_running(&self, f: impl FnOnce()) -> bool {
        self.node.do_if_running(f)
    }

    /// The effective deadline, or `None` when no timeout is
    /// configured or the node has not begun executing yet.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.node.deadline()
    }

    /// Execution time so far, or the final cost once the node's done
    /// signal has fired.
    #[must_use]
    pub fn cost(&self) -> Duration {
        self.node.cost()
    }

    /// How many times the processor has been invoked.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.node.attempts()
    }
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name())
            .field("status", &self.node.status())
            .field("attempts", &self.attempts())
            .finish()
    }
}
