//! Dataflow Actors
//!
//! Actor implementations for the dataflow execution engine.
//! Each actor is an atomic building block that can be attached to a graph
//! vertex and composed into larger dataflows.
//!
//! # Categories
//!
//! - **Control**: Actors driving the evaluation machinery itself
//!   (conditional gating, per-element mapping)
//! - **Std**: Plain value producers and transformers (constants, counters,
//!   arithmetic)

pub mod control;
pub mod std_actors;

// Re-export all actors for convenience
pub use control::*;
pub use std_actors::*;
