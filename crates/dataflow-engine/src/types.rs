//! Core identifier and value types for dataflow graphs.
//!
//! Vertex, port, edge and execution identifiers are small dense integers
//! issued by [`crate::id::IdGenerator`]; they are used as direct map keys
//! throughout the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dynamic value flowing through ports.
///
/// A sequence is a [`serde_json::Value::Array`]; "no value" returned by an
/// actor is [`serde_json::Value::Null`].
pub type Value = serde_json::Value;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a vertex in a dataflow graph.
    VertexId
);
define_id!(
    /// Graph-wide unique identifier for a port.
    PortId
);
define_id!(
    /// Graph-wide unique identifier for an edge.
    EdgeId
);
define_id!(
    /// Identifier for one logical evaluation run.
    ExecId
);

/// Direction of a port. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// The port receives values.
    In,
    /// The port produces values.
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
        }
    }
}

/// Start/end timestamps for one task (vertex) execution.
///
/// Both fields are `None` when the vertex was skipped on the last run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTiming {
    /// When the actor invocation started.
    pub start: Option<DateTime<Utc>>,
    /// When the actor invocation finished.
    pub end: Option<DateTime<Utc>>,
}

impl TaskTiming {
    /// True if the task actually ran (a start timestamp was recorded).
    pub fn has_run(&self) -> bool {
        self.start.is_some()
    }
}
