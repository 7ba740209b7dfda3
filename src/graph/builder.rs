//! Graph freezing and cycle detection.
//!
//! The builder walks the definitions depth-first from the supplied
//! leaves, interning each unique node (by `Arc` identity) into a flat
//! metadata table and recording adjacency as indices. A second pass
//! detects cycles over the combined strong and weak edge set and
//! reports the exact path.

use crate::errors::CycleError;
use crate::graph::Dag;
use crate::node::{Node, NodeMetadata};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct DagBuilder<T> {
    leaves: Vec<Arc<Node<T>>>,
    metadata: Vec<NodeMetadata<T>>,
    /// Definition identity (`Arc::as_ptr`) to metadata index.
    index: HashMap<usize, usize>,
    /// Cycle pass: subtree fully explored and known acyclic.
    visited: Vec<bool>,
    /// Cycle pass: successor on the live DFS path, if this node is on it.
    next: Vec<Option<usize>>,
}

impl<T> DagBuilder<T> {
    pub(crate) fn new(leaves: Vec<Arc<Node<T>>>) -> Self {
        Self {
            index: HashMap::with_capacity(leaves.len()),
            metadata: Vec::with_capacity(leaves.len()),
            leaves,
            visited: Vec::new(),
            next: Vec::new(),
        }
    }

    pub(crate) fn build(mut self) -> Result<Dag<T>, CycleError> {
        let leaves = std::mem::take(&mut self.leaves);
        for leaf in &leaves {
            self.intern(leaf);
        }

        self.visited = vec![false; self.metadata.len()];
        self.next = vec![None; self.metadata.len()];
        for idx in 0..self.metadata.len() {
            self.detect_cycle(idx)?;
        }

        let roots = self
            .metadata
            .iter()
            .enumerate()
            .filter(|(_, meta)| meta.dep_count == 0)
            .map(|(idx, _)| idx)
            .collect();
        let metadata = self.metadata.into_iter().map(Arc::new).collect();
        Ok(Dag::from_parts(metadata, roots))
    }

    /// Interns a definition, recursing into its strong then weak
    /// dependencies. The index entry is made before recursing, so a
    /// cyclic definition set terminates and is left for the cycle
    /// pass to report.
    fn intern(&mut self, node: &Arc<Node<T>>) -> usize {
        let key = Arc::as_ptr(node) as usize;
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.metadata.len();
        self.index.insert(key, idx);
        self.metadata.push(NodeMetadata::freeze(node));

        for dep in node.dependencies() {
            let dep_idx = self.intern(&dep);
            self.metadata[dep_idx].children.push(idx);
            self.metadata[idx].dep_count += 1;
        }
        for dep in node.weak_dependencies() {
            let dep_idx = self.intern(&dep);
            self.metadata[dep_idx].weak_children.push(idx);
            self.metadata[idx].dep_count += 1;
        }
        idx
    }

    fn detect_cycle(&mut self, idx: usize) -> Result<(), CycleError> {
        if let Some(first) = self.next[idx] {
            // idx is on the live DFS path: walk it back around to idx
            // and reverse to get the source-order cycle.
            let mut path = vec![self.metadata[idx].name.clone()];
            let mut cur = first;
            while cur != idx {
                path.push(self.metadata[cur].name.clone());
                match self.next[cur] {
                    Some(succ) => cur = succ,
                    // on-path nodes always have a successor recorded
                    None => break,
                }
            }
            path.push(self.metadata[idx].name.clone());
            path.reverse();
            return Err(CycleError::new(path));
        }
        if self.visited[idx] {
            return Ok(());
        }
        self.visited[idx] = true;

        let children = self.metadata[idx].children.clone();
        for child in children {
            self.next[idx] = Some(child);
            self.detect_cycle(child)?;
        }
        let weak_children = self.metadata[idx].weak_children.clone();
        for child in weak_children {
            self.next[idx] = Some(child);
            self.detect_cycle(child)?;
        }
        self.next[idx] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    fn named(name: &str) -> Arc<Node<()>> {
        NodeBuilder::new(name).build()
    }

    #[test]
    fn test_interning_dedupes_shared_dependencies() {
        let base = named("base");
        let left = NodeBuilder::new("left").with_dependency(&base).build();
        let right = NodeBuilder::new("right").with_dependency(&base).build();
        let sink = NodeBuilder::new("sink")
            .with_dependency(&left)
            .with_dependency(&right)
            .build();

        let dag = Dag::new([sink]).unwrap();
        assert_eq!(dag.node_count(), 4);
    }

    #[test]
    fn test_identity_is_by_allocation_not_name() {
        let twin_a = named("twin");
        let twin_b = named("twin");
        let sink = NodeBuilder::new("sink")
            .with_dependency(&twin_a)
            .with_dependency(&twin_b)
            .build();

        let dag = Dag::new([sink]).unwrap();
        assert_eq!(dag.node_count(), 3);
    }

    #[test]
    fn test_cycle_reports_source_order_path() {
        let node1 = named("node1");
        let node2 = named("node2");
        let node3 = named("node3");
        node1.add_dependency([&node3]);
        node2.add_dependency([&node1]);
        node3.add_dependency([&node2]);

        let err = Dag::new([node3]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected: node3 -> node2 -> node1 -> node3"
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle_of_length_one() {
        let node = named("selfish");
        node.add_dependency([&node]);

        let err = Dag::new([node]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected: selfish -> selfish"
        );
    }

    #[test]
    fn test_weak_edges_participate_in_cycles() {
        let a = named("a");
        let b = named("b");
        a.add_dependency([&b]);
        b.add_weak_dependency([&a]);

        assert!(Dag::new([a, b]).is_err());
    }

    #[test]
    fn test_disconnected_components_have_their_own_roots() {
        let a = named("a");
        let b = NodeBuilder::new("b").with_dependency(&a).build();
        let x = named("x");
        let y = NodeBuilder::new("y").with_dependency(&x).build();

        let dag = Dag::new([b, y]).unwrap();
        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.root_count(), 2);
    }

    #[test]
    fn test_duplicate_dependencies_count_as_multiple_edges() {
        let dep = named("dep");
        let sink = NodeBuilder::new("sink")
            .with_dependency(&dep)
            .with_dependency(&dep)
            .build();

        let dag = Dag::new([sink]).unwrap();
        // both edges appear in the rendered graph
        let mermaid = dag.to_mermaid();
        assert_eq!(mermaid.matches("1 --> 0").count(), 2);
    }

    #[test]
    fn test_building_twice_is_deterministic() {
        let base = named("base");
        let mid = NodeBuilder::new("mid").with_weak_dependency(&base).build();
        let sink = NodeBuilder::new("sink").with_dependency(&mid).build();

        let first = Dag::new([sink.clone()]).unwrap();
        let second = Dag::new([sink]).unwrap();
        assert_eq!(first.to_mermaid(), second.to_mermaid());
        assert_eq!(first.node_count(), second.node_count());
    }
}
