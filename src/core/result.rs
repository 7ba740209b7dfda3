//! Per-node run results.

use crate::core::NodeStatus;
use crate::errors::NodeError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The outcome of one node in one run.
///
/// [`Dag::run`](crate::graph::Dag::run) returns one result per metadata
/// node, in metadata index order.
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Final status. `Waiting` means a strong dependency failed and the
    /// node was never fired.
    pub status: NodeStatus,
    /// The recorded error, present when `status` is `Failed`.
    pub err: Option<Arc<NodeError>>,
    /// When the node began executing; `None` if it never started.
    pub begin: Option<Instant>,
    /// Wall-clock time from begin to the done signal, inclusive of all
    /// retries and backoff sleeps. For a node still executing past its
    /// deadline when results were collected, this is the elapsed time
    /// at collection.
    pub cost: Duration,
    /// How many times the processor was invoked.
    pub attempts: u32,
}

impl NodeResult {
    /// Returns true if the node completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the node failed with the timeout sentinel.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.err.as_deref().is_some_and(NodeError::is_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_predicates() {
        let ok = NodeResult {
            status: NodeStatus::Succeeded,
            err: None,
            begin: Some(Instant::now()),
            cost: Duration::from_millis(3),
            attempts: 1,
        };
        assert!(ok.is_success());
        assert!(!ok.is_timeout());

        let timed_out = NodeResult {
            status: NodeStatus::Failed,
            err: Some(Arc::new(NodeError::Timeout)),
            begin: Some(Instant::now()),
            cost: Duration::from_millis(5),
            attempts: 2,
        };
        assert!(!timed_out.is_success());
        assert!(timed_out.is_timeout());
    }
}
