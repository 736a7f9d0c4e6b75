//! Dataflow Engine - Graph-based dataflow execution
//!
//! This crate provides a synchronous dataflow execution engine: a directed
//! graph of vertices with named, directed ports, where each vertex optionally
//! carries an actor that computes its outputs from its inputs. It supports:
//!
//! - Brute-force and lazy pull-based evaluation
//! - Control-flow actors (conditional gating, per-element mapping) that
//!   recursively evaluate upstream sub-graph slices
//! - Composite actors: a whole graph packaged as one callable actor
//! - Provenance: execution lineage, state snapshots and task timings
//! - Declarative graph descriptions instantiated through an actor factory
//!
//! # Architecture
//!
//! - `DataflowGraph`: the mutable graph; `GraphView` is the shared read API
//! - `SubDataflow`: a filtered projection, including upstream closures
//! - `EvaluationState`: port values, changed flags and per-vertex bookkeeping
//! - `EvalAlgorithm`: the traversal, with `BruteForceEvaluation` and
//!   `LazyEvaluation` as the stock per-vertex decision hooks
//!
//! # Example
//!
//! ```
//! use dataflow_engine::{
//!     Actor, BruteForceEvaluation, DataflowGraph, EvalAlgorithm,
//!     EvaluationState, ExecutionContext, GraphView, PortSpec, Value,
//! };
//!
//! # fn main() -> dataflow_engine::Result<()> {
//! let mut graph = DataflowGraph::new();
//! let double = Actor::function(
//!     vec![PortSpec::new("in")],
//!     vec![PortSpec::new("out")],
//!     |inputs: &[Value]| Ok(Value::from(inputs[0].as_i64().unwrap_or(0) * 2)),
//! );
//! let v = graph.add_actor(double)?;
//!
//! let mut state = EvaluationState::new();
//! state.set_data(&graph, graph.in_port(v, "in")?, Value::from(21))?;
//!
//! let mut ctx = ExecutionContext::new();
//! ctx.new_execution(None)?;
//! BruteForceEvaluation.eval(&graph, &mut ctx, &mut state, None)?;
//!
//! assert_eq!(state.get_data(&graph, graph.out_port(v, "out")?)?, Value::from(42));
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod algo;
pub mod composite;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod id;
pub mod provenance;
pub mod state;
pub mod subgraph;
pub mod types;

// Re-export key types
pub use actor::{Actor, ActorBody, ActorFn, ControlFlowActor, OutputConvention, PortSpec};
pub use algo::{
    eval_upstream_slice, BruteForceEvaluation, EvalAlgorithm, EvalDecision, LazyEvaluation,
};
pub use composite::CompositeActor;
pub use context::ExecutionContext;
pub use descriptor::{instantiate, ActorFactory, Connection, GraphDescription};
pub use error::{DataflowError, Result};
pub use graph::{ActorHandle, DataflowGraph, Edge, GraphView, Port};
pub use provenance::{ProvenanceStore, SnapshotEntry, StateSnapshot};
pub use state::{EvaluationState, FanInOrder};
pub use subgraph::SubDataflow;
pub use types::{EdgeId, ExecId, PortDirection, PortId, TaskTiming, Value, VertexId};
