//! The frozen, reusable DAG and its runner.

use crate::core::NodeResult;
use crate::errors::CycleError;
use crate::graph::builder::DagBuilder;
use crate::node::{Node, NodeMetadata};
use crate::pool::WorkerPool;
use crate::runtime::{completion_channel, RunContext, RuntimeNode};
use std::sync::Arc;

/// An immutable graph of frozen node metadata, executable any number
/// of times with independent parameters and runtime state.
pub struct Dag<T> {
    metadata: Vec<Arc<NodeMetadata<T>>>,
    roots: Vec<usize>,
}

impl<T> std::fmt::Debug for Dag<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dag")
            .field("node_count", &self.metadata.len())
            .field("roots", &self.roots)
            .finish()
    }
}

impl<T> Dag<T> {
    pub(crate) fn from_parts(metadata: Vec<Arc<NodeMetadata<T>>>, roots: Vec<usize>) -> Self {
        Self { metadata, roots }
    }

    pub(crate) fn metadata(&self) -> &[Arc<NodeMetadata<T>>] {
        &self.metadata
    }

    /// Freezes the given definitions into a DAG, or reports a cycle.
    ///
    /// Pass at least the terminal leaves; every node reachable through
    /// their (weak) dependencies is scanned depth-first and interned.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] when the combined strong and weak edge
    /// set contains a cycle; no DAG is produced.
    pub fn new(leaves: impl IntoIterator<Item = Arc<Node<T>>>) -> Result<Self, CycleError> {
        DagBuilder::new(leaves.into_iter().collect()).build()
    }

    /// Number of unique nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.metadata.len()
    }

    /// True when the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Number of root nodes (no strong or weak predecessors).
    #[must_use]
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }
}

impl<T: Send + Sync + 'static> Dag<T> {
    /// Executes the graph, spawning one unbounded task per runnable
    /// node, and returns one result per node in metadata index order.
    ///
    /// Nodes whose strong dependency failed are reported `Waiting`
    /// with zero attempts. Errors never abort the run; consult the
    /// results to see which nodes completed and how.
    pub async fn run(&self, params: Arc<T>) -> Vec<NodeResult> {
        self.execute(None, params).await
    }

    /// Like [`Dag::run`], but dispatches node tasks through the given
    /// pool. See [`FifoPool`](crate::pool::FifoPool) for the sizing
    /// caveat when timeouts are configured.
    pub async fn run_with_pool(
        &self,
        pool: Arc<dyn WorkerPool>,
        params: Arc<T>,
    ) -> Vec<NodeResult> {
        self.execute(Some(pool), params).await
    }

    async fn execute(&self, pool: Option<Arc<dyn WorkerPool>>, params: Arc<T>) -> Vec<NodeResult> {
        let ctx = Arc::new(RunContext::new(pool, self.metadata.len()));
        let nodes: Vec<Arc<RuntimeNode<T>>> = self
            .metadata
            .iter()
            .map(|meta| RuntimeNode::new(meta.clone(), ctx.clone()))
            .collect();
        for (node, meta) in nodes.iter().zip(&self.metadata) {
            node.wire(
                meta.children.iter().map(|&idx| nodes[idx].clone()).collect(),
                meta.weak_children
                    .iter()
                    .map(|&idx| nodes[idx].clone())
                    .collect(),
            );
        }

        let (guard, mut completed) = completion_channel();
        for &root in &self.roots {
            nodes[root].start(&params, &guard);
        }
        drop(guard);
        // resolves once every driver task has released its guard
        let _ = completed.recv().await;

        nodes.iter().map(|node| node.result()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    #[test]
    fn test_empty_dag() {
        let dag = Dag::<()>::new([]).unwrap();
        assert!(dag.is_empty());
        assert_eq!(dag.node_count(), 0);
        assert_eq!(dag.root_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_dag_run_returns_no_results() {
        let dag = Dag::<()>::new([]).unwrap();
        let results = dag.run(Arc::new(())).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_roots_have_no_predecessors() {
        let a = NodeBuilder::<()>::new("a").build();
        let b = NodeBuilder::new("b").with_dependency(&a).build();
        let c = NodeBuilder::new("c").with_weak_dependency(&b).build();

        let dag = Dag::new([c]).unwrap();
        assert_eq!(dag.node_count(), 3);
        assert_eq!(dag.root_count(), 1);
    }
}
