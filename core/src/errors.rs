//! Error kinds surfaced by the optimizer.
//!
//! Everything is carried in an `anyhow::Error`; the typed `GraphError` sits
//! at the root of the chain and context layers name the offending node and
//! transformation.
use thiserror::Error;

pub type MoResult<T> = anyhow::Result<T>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node or edge reference that does not resolve.
    #[error("{0} not found")]
    Lookup(String),
    /// A mutation that would break a structural invariant of the graph.
    #[error("Invalid graph operation: {0}")]
    Graph(String),
    #[error("No inference rule registered for op {op}{}", .node.as_ref().map(|n| format!(" (node {n})")).unwrap_or_default())]
    UnknownOp { op: String, node: Option<String> },
    #[error("Shape inference failed for node {node}: {reason}")]
    ShapeInference { node: String, reason: String },
    #[error("Transformation dependency cycle: {}", .0.join(" -> "))]
    SchedulingCycle(Vec<String>),
    #[error("Op {0} is already registered")]
    DuplicateOp(String),
}

/// Find the typed error kind anywhere in an error chain.
pub fn error_kind(e: &anyhow::Error) -> Option<&GraphError> {
    e.chain().find_map(|e| e.downcast_ref::<GraphError>())
}
