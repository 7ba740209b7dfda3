//! Frozen node metadata.
//!
//! Freezing serves two purposes: user mutations to a [`Node`] after
//! the graph is built cannot affect execution, and adjacency becomes
//! integer indices into a flat table instead of pointer chasing.

use crate::backoff::BackoffFn;
use crate::node::{Node, NodeHook, ProcessorFn};
use std::time::Duration;

/// Name substituted for nodes defined with an empty name.
pub(crate) const NONAME: &str = "noname";

/// One node's frozen record. Does not retain the definition.
pub(crate) struct NodeMetadata<T> {
    pub(crate) name: String,
    pub(crate) processor: Option<ProcessorFn<T>>,
    pub(crate) local_timeout: Option<Duration>,
    pub(crate) total_timeout: Option<Duration>,
    /// Strong plus weak predecessor count, duplicates included.
    pub(crate) dep_count: u32,
    /// Indices of nodes listing this one as a strong dependency.
    pub(crate) children: Vec<usize>,
    /// Indices of nodes listing this one as a weak dependency.
    pub(crate) weak_children: Vec<usize>,
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Option<BackoffFn>,
    pub(crate) on_success: Option<NodeHook<T>>,
    pub(crate) on_failure: Option<NodeHook<T>>,
}

impl<T> NodeMetadata<T> {
    pub(crate) fn freeze(node: &Node<T>) -> Self {
        let name = if node.name().is_empty() {
            NONAME.to_string()
        } else {
            node.name().to_string()
        };
        Self {
            name,
            processor: node.processor().cloned(),
            local_timeout: node.local_timeout(),
            total_timeout: node.total_timeout(),
            dep_count: 0,
            children: Vec::new(),
            weak_children: Vec::new(),
            max_attempts: node.max_attempts(),
            backoff: node.backoff().cloned(),
            on_success: node.on_success().cloned(),
            on_failure: node.on_failure().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    #[test]
    fn test_freeze_copies_scalars() {
        let node = NodeBuilder::<()>::new("fetch")
            .with_local_timeout(Duration::from_millis(5))
            .with_max_attempts(4)
            .build();
        let meta = NodeMetadata::freeze(&node);

        assert_eq!(meta.name, "fetch");
        assert_eq!(meta.local_timeout, Some(Duration::from_millis(5)));
        assert_eq!(meta.max_attempts, 4);
        assert_eq!(meta.dep_count, 0);
        assert!(meta.children.is_empty());
        assert!(meta.weak_children.is_empty());
    }

    #[test]
    fn test_freeze_defaults_empty_name() {
        let node = NodeBuilder::<()>::new("").build();
        let meta = NodeMetadata::freeze(&node);
        assert_eq!(meta.name, NONAME);
    }
}
