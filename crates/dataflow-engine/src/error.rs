//! Error types for the dataflow engine.

use thiserror::Error;

use crate::types::{ExecId, PortId, VertexId};

/// Result type alias using DataflowError.
pub type Result<T> = std::result::Result<T, DataflowError>;

/// Errors that can occur in the dataflow engine.
///
/// All failures surface synchronously to the caller of the operation that
/// detected them; nothing is swallowed inside the evaluation recursion.
#[derive(Debug, Error)]
pub enum DataflowError {
    /// Referenced vertex does not exist.
    #[error("vertex {0} not found")]
    VertexNotFound(VertexId),

    /// Referenced port does not exist (or is outside a filtered view).
    #[error("port {0} not found")]
    PortNotFound(String),

    /// Referenced edge does not exist (or is outside a filtered view).
    #[error("edge {0} not found")]
    EdgeNotFound(String),

    /// Referenced execution id is unknown to the provenance lineage.
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecId),

    /// Referenced graph-description element does not exist.
    #[error("element '{0}' not found")]
    ElementNotFound(String),

    /// Duplicate port name, duplicate id, or double-store of an execution.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A port was used against its declared direction.
    #[error("wrong port direction: {0}")]
    DirectionMismatch(String),

    /// Evaluation was attempted with unresolved inputs or no execution id.
    #[error("not ready: {0}")]
    NotReady(String),

    /// An actor's return shape disagrees with its declared output ports.
    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    /// A composite actor re-entered its own evaluation.
    #[error("recursive evaluation: {0}")]
    Recursion(String),

    /// A capability was invoked that this object does not implement.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
}

impl DataflowError {
    /// Create a port-not-found error from a port id.
    pub fn port_not_found(port: PortId) -> Self {
        Self::PortNotFound(port.to_string())
    }

    /// Create a conflict error with a message.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a direction-mismatch error with a message.
    pub fn direction(msg: impl Into<String>) -> Self {
        Self::DirectionMismatch(msg.into())
    }

    /// Create a not-ready error with a message.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create an arity-mismatch error with a message.
    pub fn arity(msg: impl Into<String>) -> Self {
        Self::ArityMismatch(msg.into())
    }

    /// Create a recursion error with a message.
    pub fn recursion(msg: impl Into<String>) -> Self {
        Self::Recursion(msg.into())
    }
}
