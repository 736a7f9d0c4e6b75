//! Composite actors: a whole graph behaving as one actor.
//!
//! A [`CompositeActor`] wraps an inner graph carrying two boundary vertices.
//! The boundary-in vertex exposes Out ports that receive the composite's
//! arguments; the boundary-out vertex exposes In ports that collect its
//! results. Each call starts a fresh inner execution and pulls from the
//! boundary-out vertex.

use log::debug;

use crate::actor::{Actor, PortSpec};
use crate::algo::EvalAlgorithm;
use crate::context::ExecutionContext;
use crate::error::{DataflowError, Result};
use crate::graph::{DataflowGraph, GraphView};
use crate::state::EvaluationState;
use crate::types::{PortId, Value, VertexId};

/// An inner graph packaged as a callable unit.
///
/// Inputs map onto the boundary-in vertex's Out ports and outputs onto the
/// boundary-out vertex's In ports, both ordered by local port key.
pub struct CompositeActor {
    graph: DataflowGraph,
    algo: Box<dyn EvalAlgorithm>,
    ctx: ExecutionContext,
    state: EvaluationState,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    out_vertex: VertexId,
    in_ports: Vec<PortId>,
    out_ports: Vec<PortId>,
}

impl CompositeActor {
    /// Package a graph with boundary vertices as a composite actor.
    ///
    /// The graph must have both boundaries set. Declared defaults of inner
    /// actors are seeded into the state up front.
    pub fn new(graph: DataflowGraph, algo: Box<dyn EvalAlgorithm>) -> Result<Self> {
        let Some(in_vertex) = graph.boundary_in() else {
            return Err(DataflowError::not_ready(
                "composite graph has no boundary-in vertex",
            ));
        };
        let Some(out_vertex) = graph.boundary_out() else {
            return Err(DataflowError::not_ready(
                "composite graph has no boundary-out vertex",
            ));
        };

        let mut in_ports = graph.out_ports(in_vertex)?;
        in_ports.sort_by_key(|pid| {
            graph.port(*pid).map(|p| p.local_id).unwrap_or_default()
        });
        let mut out_ports = graph.in_ports(out_vertex)?;
        out_ports.sort_by_key(|pid| {
            graph.port(*pid).map(|p| p.local_id).unwrap_or_default()
        });

        let specs = |pids: &[PortId]| -> Result<Vec<PortSpec>> {
            pids.iter()
                .map(|pid| Ok(PortSpec::new(graph.port(*pid)?.local_id)))
                .collect()
        };
        let inputs = specs(&in_ports)?;
        let outputs = specs(&out_ports)?;

        let mut state = EvaluationState::new();
        state.seed_defaults(&graph)?;

        Ok(Self {
            graph,
            algo,
            ctx: ExecutionContext::new(),
            state,
            inputs,
            outputs,
            out_vertex,
            in_ports,
            out_ports,
        })
    }

    /// The declared input layout (boundary-in keys, sorted).
    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    /// The declared output layout (boundary-out keys, sorted).
    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    /// The inner graph.
    pub fn graph(&self) -> &DataflowGraph {
        &self.graph
    }

    /// The inner execution context (attach provenance here to trace inner
    /// runs).
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.ctx
    }

    /// The inner evaluation state (pre-load values for inner lonely inputs
    /// here).
    pub fn state_mut(&mut self) -> &mut EvaluationState {
        &mut self.state
    }

    /// Call the composite: bind arguments, run the inner graph, collect
    /// results as a sequence ordered like [`outputs`](Self::outputs).
    pub fn eval(&mut self, inputs: &[Value]) -> Result<Value> {
        if inputs.len() != self.in_ports.len() {
            return Err(DataflowError::arity(format!(
                "composite takes {} inputs, got {}",
                self.in_ports.len(),
                inputs.len()
            )));
        }
        let exec = self.ctx.new_execution(None)?;
        debug!("composite call under inner execution {}", exec);

        for (pid, value) in self.in_ports.iter().zip(inputs) {
            self.state.set_data(&self.graph, *pid, value.clone())?;
        }
        self.algo
            .eval(&self.graph, &mut self.ctx, &mut self.state, Some(self.out_vertex))?;

        let mut results = Vec::with_capacity(self.out_ports.len());
        for pid in &self.out_ports {
            results.push(self.state.get_data(&self.graph, *pid)?);
        }
        Ok(Value::Array(results))
    }

    /// Wrap the composite as an ordinary actor: one output port per
    /// boundary-out key, fed by the result sequence in declared order.
    pub fn into_actor(self) -> Actor {
        let inputs = self.inputs.clone();
        let outputs = self.outputs.clone();
        let mut this = self;
        Actor::function(inputs, outputs, move |vals: &[Value]| this.eval(vals))
    }
}
