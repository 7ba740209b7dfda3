//! Error types for the dagflow engine.
//!
//! Build-time errors (cycle detection) and per-node runtime errors are
//! kept as separate types: a [`CycleError`] means no DAG was produced,
//! while a [`NodeError`] is recorded on a single node's result without
//! stopping the rest of the graph.

use thiserror::Error;

/// A boxed error that can be sent across threads.
///
/// This is the standard error type of the async Rust ecosystem; any
/// error implementing `std::error::Error` converts into it, as do
/// plain strings.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error recorded on a failed node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node's deadline fired, or the total timeout had already
    /// elapsed when the node became runnable.
    #[error("timeout")]
    Timeout,

    /// The processor panicked; the panic was recovered and converted.
    #[error("recover panic over node {node}: {message}")]
    Panic {
        /// Name of the node whose processor panicked.
        node: String,
        /// The panic payload, rendered as text.
        message: String,
    },

    /// The processor returned an error.
    #[error("{0}")]
    Processor(BoxError),
}

impl NodeError {
    /// Returns true if this is the timeout sentinel.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<BoxError> for NodeError {
    fn from(err: BoxError) -> Self {
        Self::Processor(err)
    }
}

/// A cyclic dependency was detected while freezing a graph.
///
/// The path begins and ends with the same node and is reported in
/// source order, e.g. `node3 -> node2 -> node1 -> node3`.
#[derive(Debug, Clone, Error)]
#[error("cyclic dependency detected: {}", .path.join(" -> "))]
pub struct CycleError {
    /// Node names along the cycle, first and last identical.
    pub path: Vec<String>,
}

impl CycleError {
    pub(crate) fn new(path: Vec<String>) -> Self {
        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_sentinel_display() {
        assert_eq!(NodeError::Timeout.to_string(), "timeout");
        assert!(NodeError::Timeout.is_timeout());
    }

    #[test]
    fn test_panic_error_display() {
        let err = NodeError::Panic {
            node: "fetch".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "recover panic over node fetch: boom");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_processor_error_is_transparent() {
        let err = NodeError::from(BoxError::from("upstream unavailable"));
        assert_eq!(err.to_string(), "upstream unavailable");
    }

    #[test]
    fn test_cycle_error_display() {
        let err = CycleError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
    }
}
