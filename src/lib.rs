//! # Dagflow
//!
//! A typed DAG task execution engine.
//!
//! Dagflow freezes a set of user node definitions into an immutable,
//! index-addressed graph, then executes it any number of times with
//! independent parameters and independent runtime state:
//!
//! - **Strong and weak dependencies**: a strong predecessor must succeed
//!   before a node fires; a weak predecessor only has to finish.
//! - **Timeouts**: per-node local deadlines and graph-wide total
//!   deadlines, cooperatively interlocked with user code via
//!   [`NodeHandle::do_if_running`].
//! - **Bounded retry**: per-node attempt limits with pluggable backoff.
//! - **Worker pools**: optional bounded FIFO dispatch behind the
//!   [`WorkerPool`] trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dagflow::prelude::*;
//! use std::sync::atomic::{AtomicI64, Ordering};
//!
//! #[derive(Default)]
//! struct Params {
//!     total: AtomicI64,
//! }
//!
//! let fetch = NodeBuilder::new("fetch")
//!     .with_processor(|_node, params: Arc<Params>| async move {
//!         params.total.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     })
//!     .build();
//! let report = NodeBuilder::new("report")
//!     .with_dependency(&fetch)
//!     .build();
//!
//! let dag = Dag::new([report])?;
//! let results = dag.run(Arc::new(Params::default())).await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs, rust_2018_idioms)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod backoff;
pub mod core;
pub mod errors;
pub mod graph;
pub mod node;
pub mod pool;
pub mod runtime;

pub use crate::core::{NodeResult, NodeStatus};
pub use crate::errors::{BoxError, CycleError, NodeError};
pub use crate::graph::Dag;
pub use crate::node::{Node, NodeBuilder};
pub use crate::pool::{FifoPool, WorkerPool};
pub use crate::runtime::NodeHandle;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backoff::{
        exponential, exponential_with_jitter, linear, linear_with_jitter, BackoffFn,
    };
    pub use crate::core::{NodeResult, NodeStatus};
    pub use crate::errors::{BoxError, CycleError, NodeError};
    pub use crate::graph::Dag;
    pub use crate::node::{Node, NodeBuilder};
    pub use crate::pool::{FifoPool, PoolTask, WorkerPool};
    pub use crate::runtime::NodeHandle;
    pub use std::sync::Arc;
}
