//! Node status enum backing the runtime state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a node within one run.
///
/// Transitions form a strict partial order: `Waiting` → `Running` →
/// {`Succeeded`, `Failed`}, driven by compare-and-swap on the atomic
/// representation. A node whose strong dependency failed is never
/// started and stays `Waiting` in the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NodeStatus {
    /// Not yet fired; dependencies still outstanding (or never met).
    Waiting = 0,
    /// Fired and currently executing (or queued on a pool).
    Running = 1,
    /// Terminal: the processor returned success.
    Succeeded = 2,
    /// Terminal: the processor failed, timed out, or panicked.
    Failed = 3,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Waiting
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl NodeStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The stable integer form stored in the status atomic.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            _ => Self::Waiting,
        }
    }
}
