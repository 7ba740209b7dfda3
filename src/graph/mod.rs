//! Graph freezing, validation, and execution entry points.

mod builder;
mod dag;
mod mermaid;

pub use dag::Dag;
