//! Mermaid rendering of a frozen graph.
//!
//! Nodes are numbered by metadata index (DFS interning order from the
//! given leaves); strong edges render as `-->`, weak edges as `-.->`.

use crate::graph::Dag;
use std::fmt::Write as _;
use std::fs::File;
use std::io;
use std::path::Path;

impl<T> Dag<T> {
    /// Renders the graph as a Mermaid `graph TB` diagram.
    #[must_use]
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TB\n");
        for (idx, meta) in self.metadata().iter().enumerate() {
            let _ = writeln!(out, "    {idx}({})", meta.name);
        }
        for (idx, meta) in self.metadata().iter().enumerate() {
            for &child in &meta.children {
                let _ = writeln!(out, "    {idx} --> {child}");
            }
            for &child in &meta.weak_children {
                let _ = writeln!(out, "    {idx} -.-> {child}");
            }
        }
        out
    }

    /// Writes the Mermaid rendering to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates any error from the writer.
    pub fn write_mermaid<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.to_mermaid().as_bytes())
    }

    /// Writes the Mermaid rendering to the file at `path`, creating or
    /// truncating it.
    ///
    /// # Errors
    ///
    /// Propagates file creation and write errors.
    pub fn save_mermaid<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        self.write_mermaid(&mut file)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Dag;
    use crate::node::{Node, NodeBuilder};
    use std::sync::Arc;

    #[test]
    fn test_mermaid_renders_nodes_and_edge_styles() {
        let node1: Arc<Node<()>> = NodeBuilder::new("node1").build();
        let node2 = NodeBuilder::new("node2").with_dependency(&node1).build();
        let node3 = NodeBuilder::new("node3").with_weak_dependency(&node2).build();

        let dag = Dag::new([node3]).unwrap();
        assert_eq!(
            dag.to_mermaid(),
            "graph TB\n    0(node3)\n    1(node2)\n    2(node1)\n    1 -.-> 0\n    2 --> 1\n"
        );
    }

    #[test]
    fn test_mermaid_uses_noname_for_empty_names() {
        let anon: Arc<Node<()>> = NodeBuilder::new("").build();
        let dag = Dag::new([anon]).unwrap();
        assert_eq!(dag.to_mermaid(), "graph TB\n    0(noname)\n");
    }

    #[test]
    fn test_write_mermaid_matches_to_mermaid() {
        let a: Arc<Node<()>> = NodeBuilder::new("a").build();
        let b = NodeBuilder::new("b").with_dependency(&a).build();
        let dag = Dag::new([b]).unwrap();

        let mut buf = Vec::new();
        dag.write_mermaid(&mut buf).unwrap();
        assert_eq!(buf, dag.to_mermaid().into_bytes());
    }
}
