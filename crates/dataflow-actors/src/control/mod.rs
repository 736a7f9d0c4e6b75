//! Control-flow actors.
//!
//! These actors receive the evaluation machinery instead of resolved
//! arguments and drive it over upstream sub-graph slices.

mod conditional;
mod map;

pub use conditional::{truthy, ConditionalGate, ConditionalGateWithFallback};
pub use map::MapOverSequence;
