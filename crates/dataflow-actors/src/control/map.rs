//! Map actor.
//!
//! Applies the sub-graph feeding its `task` input once per element of a
//! sequence, injecting each element into a designated port inside that
//! sub-graph and collecting the per-element results.

use dataflow_engine::{
    eval_upstream_slice, Actor, ControlFlowActor, DataflowError, EvalAlgorithm, EvaluationState,
    ExecutionContext, GraphView, PortId, PortSpec, Result, SubDataflow, Value, VertexId,
};
use log::debug;

/// Map Over Sequence
///
/// Evaluates the sub-graph feeding `items` once to obtain a sequence, then
/// evaluates the sub-graph feeding `task` once per element. Each element is
/// written to the configured element port (an unconnected input inside the
/// task slice) before the iteration runs on a scratch copy of the state, so
/// iterations stay independent. The output is the sequence of per-element
/// task values.
///
/// The element port should carry a declared default (or an initial value in
/// the state) so the enclosing graph passes the readiness check before the
/// first element is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapOverSequence {
    element_port: Option<PortId>,
}

impl MapOverSequence {
    /// Port key for the sequence input
    pub const PORT_ITEMS: &'static str = "items";
    /// Port key for the per-element body input
    pub const PORT_TASK: &'static str = "task";
    /// Port key for the collected output
    pub const PORT_OUT: &'static str = "out";

    /// Create a map actor injecting elements into `element_port`.
    pub fn new(element_port: PortId) -> Self {
        Self {
            element_port: Some(element_port),
        }
    }

    /// Package as an actor with the declared port layout. Non-lazy for the
    /// same reason as the conditional gate: the iteration must be re-driven
    /// on every execution.
    pub fn actor(element_port: PortId) -> Actor {
        Actor::control(
            vec![PortSpec::new(Self::PORT_ITEMS), PortSpec::new(Self::PORT_TASK)],
            vec![PortSpec::new(Self::PORT_OUT)],
            Self::new(element_port),
        )
        .lazy(false)
    }
}

impl ControlFlowActor for MapOverSequence {
    fn perform_evaluation(
        &mut self,
        algo: &dyn EvalAlgorithm,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        vertex: VertexId,
    ) -> Result<()> {
        let Some(element_port) = self.element_port else {
            return Err(DataflowError::not_ready(
                "map actor has no element port configured",
            ));
        };
        let items_in = view.in_port(vertex, Self::PORT_ITEMS)?;
        let task_in = view.in_port(vertex, Self::PORT_TASK)?;
        let out = view.out_port(vertex, Self::PORT_OUT)?;

        eval_upstream_slice(algo, view, ctx, state, items_in)?;
        let items = state.get_data(view, items_in)?;
        let Value::Array(items) = items else {
            return Err(DataflowError::arity(format!(
                "map on vertex {} expects a sequence of items",
                vertex
            )));
        };
        debug!("mapping {} items on vertex {}", items.len(), vertex);

        let sub = SubDataflow::upstream(view, task_in)?;
        let mut results = Vec::with_capacity(items.len());
        for element in items {
            let mut scratch = state.clone();
            // Each iteration must recompute the slice from scratch.
            for v in sub.vertex_set() {
                scratch.clear_last_execution(*v);
            }
            scratch.set_data(view, element_port, element)?;
            algo.boxed_clone().eval(&sub, ctx, &mut scratch, None)?;
            results.push(scratch.get_data(view, task_in)?);
        }
        state.set_data(view, out, Value::Array(results))
    }
}
