//! User-facing node definitions.
//!
//! A [`Node`] describes one task: an optional async processor, strong
//! and weak dependencies on other nodes, timeout and retry settings,
//! and completion hooks. Definitions are built once, handed to
//! [`Dag::new`](crate::graph::Dag::new), and never consulted again —
//! the builder freezes everything it needs into [`NodeMetadata`].
//!
//! Node identity is by allocation, not by name: two nodes named the
//! same are two nodes, and the same `Arc` appearing in several
//! dependency lists is one node.

mod metadata;

pub(crate) use metadata::NodeMetadata;

use crate::backoff::BackoffFn;
use crate::errors::BoxError;
use crate::runtime::NodeHandle;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The future returned by a node processor.
pub type ProcessorFuture = BoxFuture<'static, Result<(), BoxError>>;

/// A node's task body. Returning `Ok(())` marks the node succeeded;
/// any error marks it failed. After a timeout the return value is
/// ignored and the node reports the timeout instead.
pub type ProcessorFn<T> = Arc<dyn Fn(NodeHandle<T>, Arc<T>) -> ProcessorFuture + Send + Sync>;

/// Hook fired on a node's terminal transition. Runs on the worker
/// task; must not block.
pub type NodeHook<T> = Arc<dyn Fn(&NodeHandle<T>, &Arc<T>) + Send + Sync>;

/// A user node definition.
///
/// Created through [`NodeBuilder`]; dependency lists may also be
/// extended after construction with [`Node::add_dependency`] and
/// [`Node::add_weak_dependency`] — the graph is only frozen (and
/// checked for cycles) when the definitions reach
/// [`Dag::new`](crate::graph::Dag::new).
pub struct Node<T> {
    name: String,
    processor: Option<ProcessorFn<T>>,
    local_timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    dependencies: RwLock<Vec<Arc<Node<T>>>>,
    weak_dependencies: RwLock<Vec<Arc<Node<T>>>>,
    max_attempts: u32,
    backoff: Option<BackoffFn>,
    on_success: Option<NodeHook<T>>,
    on_failure: Option<NodeHook<T>>,
}

impl<T> Node<T> {
    /// The diagnostic name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds strong dependencies: each must *succeed* before this node
    /// may start.
    pub fn add_dependency<'a>(&self, deps: impl IntoIterator<Item = &'a Arc<Node<T>>>)
    where
        T: 'a,
    {
        self.dependencies.write().extend(deps.into_iter().cloned());
    }

    /// Adds weak dependencies: each must *finish* (successfully or
    /// not) before this node may start.
    pub fn add_weak_dependency<'a>(&self, deps: impl IntoIterator<Item = &'a Arc<Node<T>>>)
    where
        T: 'a,
    {
        self.weak_dependencies
            .write()
            .extend(deps.into_iter().cloned());
    }

    pub(crate) fn dependencies(&self) -> Vec<Arc<Node<T>>> {
        self.dependencies.read().clone()
    }

    pub(crate) fn weak_dependencies(&self) -> Vec<Arc<Node<T>>> {
        self.weak_dependencies.read().clone()
    }

    pub(crate) fn processor(&self) -> Option<&ProcessorFn<T>> {
        self.processor.as_ref()
    }

    pub(crate) fn local_timeout(&self) -> Option<Duration> {
        self.local_timeout
    }

    pub(crate) fn total_timeout(&self) -> Option<Duration> {
        self.total_timeout
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn backoff(&self) -> Option<&BackoffFn> {
        self.backoff.as_ref()
    }

    pub(crate) fn on_success(&self) -> Option<&NodeHook<T>> {
        self.on_success.as_ref()
    }

    pub(crate) fn on_failure(&self) -> Option<&NodeHook<T>> {
        self.on_failure.as_ref()
    }
}

impl<T> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("local_timeout", &self.local_timeout)
            .field("total_timeout", &self.total_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("dependencies", &self.dependencies.read().len())
            .field("weak_dependencies", &self.weak_dependencies.read().len())
            .finish()
    }
}

/// Fluent builder for [`Node`] definitions.
pub struct NodeBuilder<T> {
    name: String,
    processor: Option<ProcessorFn<T>>,
    local_timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    dependencies: Vec<Arc<Node<T>>>,
    weak_dependencies: Vec<Arc<Node<T>>>,
    max_attempts: u32,
    backoff: Option<BackoffFn>,
    on_success: Option<NodeHook<T>>,
    on_failure: Option<NodeHook<T>>,
}

impl<T> NodeBuilder<T> {
    /// Starts a definition. An empty name is replaced with `"noname"`
    /// when the graph is frozen.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processor: None,
            local_timeout: None,
            total_timeout: None,
            dependencies: Vec::new(),
            weak_dependencies: Vec::new(),
            max_attempts: 1,
            backoff: None,
            on_success: None,
            on_failure: None,
        }
    }

    /// Sets the task body. A node without a processor succeeds
    /// immediately when fired.
    #[must_use]
    pub fn with_processor<F, Fut>(mut self, processor: F) -> Self
    where
        F: Fn(NodeHandle<T>, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.processor = Some(Arc::new(move |node, params| -> ProcessorFuture {
            Box::pin(processor(node, params))
        }));
        self
    }

    /// Deadline measured from when this node actually begins
    /// executing. `Duration::ZERO` means no timeout.
    #[must_use]
    pub fn with_local_timeout(mut self, timeout: Duration) -> Self {
        self.local_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Deadline measured from the start of the whole run.
    /// `Duration::ZERO` means no timeout.
    #[must_use]
    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Adds a strong dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: &Arc<Node<T>>) -> Self {
        self.dependencies.push(dep.clone());
        self
    }

    /// Adds a weak dependency.
    #[must_use]
    pub fn with_weak_dependency(mut self, dep: &Arc<Node<T>>) -> Self {
        self.weak_dependencies.push(dep.clone());
        self
    }

    /// Maximum processor invocations before the node fails. Values
    /// below 1 are treated as 1.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay strategy between failed attempts; see [`crate::backoff`].
    /// Without one, retries are immediate.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Hook fired when the node transitions to `Succeeded`.
    #[must_use]
    pub fn with_on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NodeHandle<T>, &Arc<T>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Hook fired when the node transitions to `Failed`.
    #[must_use]
    pub fn with_on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NodeHandle<T>, &Arc<T>) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// Finishes the definition.
    #[must_use]
    pub fn build(self) -> Arc<Node<T>> {
        Arc::new(Node {
            name: self.name,
            processor: self.processor,
            local_timeout: self.local_timeout,
            total_timeout: self.total_timeout,
            dependencies: RwLock::new(self.dependencies),
            weak_dependencies: RwLock::new(self.weak_dependencies),
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            on_success: self.on_success,
            on_failure: self.on_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let node: Arc<Node<()>> = NodeBuilder::new("fetch").build();
        assert_eq!(node.name(), "fetch");
        assert!(node.processor().is_none());
        assert!(node.local_timeout().is_none());
        assert!(node.total_timeout().is_none());
        assert_eq!(node.max_attempts(), 1);
        assert!(node.dependencies().is_empty());
        assert!(node.weak_dependencies().is_empty());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let node: Arc<Node<()>> = NodeBuilder::new("n")
            .with_local_timeout(Duration::ZERO)
            .with_total_timeout(Duration::ZERO)
            .build();
        assert!(node.local_timeout().is_none());
        assert!(node.total_timeout().is_none());
    }

    #[test]
    fn test_late_dependency_wiring() {
        let a: Arc<Node<()>> = NodeBuilder::new("a").build();
        let b: Arc<Node<()>> = NodeBuilder::new("b").build();
        let c: Arc<Node<()>> = NodeBuilder::new("c").with_dependency(&a).build();
        c.add_dependency([&b]);
        c.add_weak_dependency([&a, &b]);

        assert_eq!(c.dependencies().len(), 2);
        assert_eq!(c.weak_dependencies().len(), 2);
        assert!(Arc::ptr_eq(&c.dependencies()[1], &b));
    }
}
