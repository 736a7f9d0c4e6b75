//! Conditional gate actor.
//!
//! Gates evaluation of an upstream branch behind a test value. The branch
//! feeding the `task` input only runs when the branch feeding `test`
//! evaluates to a truthy value; otherwise the gate's output keeps its
//! previous value and is marked unchanged.

use dataflow_engine::{
    eval_upstream_slice, Actor, ControlFlowActor, EvalAlgorithm, EvaluationState,
    ExecutionContext, GraphView, PortSpec, Result, Value, VertexId,
};
use log::debug;

/// Conditional Gate
///
/// Evaluates the sub-graph feeding `test`, and only when the result is
/// truthy evaluates the sub-graph feeding `task`, forwarding the task value
/// to `out`. A falsy test leaves the untaken branch untouched and `out`
/// unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionalGate;

impl ConditionalGate {
    /// Port key for the test input
    pub const PORT_TEST: &'static str = "test";
    /// Port key for the gated input
    pub const PORT_TASK: &'static str = "task";
    /// Port key for the output
    pub const PORT_OUT: &'static str = "out";

    /// Package the gate as an actor with its declared port layout.
    ///
    /// The gate opts out of laziness: it must run on every execution so the
    /// test is re-checked, while the branches behind it stay lazy.
    pub fn actor() -> Actor {
        Actor::control(
            vec![PortSpec::new(Self::PORT_TEST), PortSpec::new(Self::PORT_TASK)],
            vec![PortSpec::new(Self::PORT_OUT)],
            Self,
        )
        .lazy(false)
    }
}

/// Interpret a value as a branch condition.
///
/// Null, false, zero and the empty string are falsy; everything else is
/// truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl ControlFlowActor for ConditionalGate {
    fn perform_evaluation(
        &mut self,
        algo: &dyn EvalAlgorithm,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        vertex: VertexId,
    ) -> Result<()> {
        let test_in = view.in_port(vertex, Self::PORT_TEST)?;
        let task_in = view.in_port(vertex, Self::PORT_TASK)?;
        let out = view.out_port(vertex, Self::PORT_OUT)?;

        // An unchanged output means this gate already settled this run.
        if state.value(out).is_some() && !state.has_changed(out) {
            return Ok(());
        }

        eval_upstream_slice(algo, view, ctx, state, test_in)?;
        let test = state.get_data(view, test_in)?;

        if truthy(&test) {
            debug!("gate on vertex {} taken", vertex);
            eval_upstream_slice(algo, view, ctx, state, task_in)?;
            let value = state.get_data(view, task_in)?;
            state.set_data(view, out, value)
        } else {
            debug!("gate on vertex {} not taken", vertex);
            state.set_changed(out, false);
            Ok(())
        }
    }
}

/// A gate whose untaken branch still needs a value downstream can swap this
/// in: a falsy test forwards the declared fallback instead of holding the
/// output.
#[derive(Debug, Clone)]
pub struct ConditionalGateWithFallback {
    fallback: Value,
}

impl ConditionalGateWithFallback {
    /// Create a gate forwarding `fallback` when the test is falsy.
    pub fn new(fallback: Value) -> Self {
        Self { fallback }
    }

    /// Package as an actor with the same layout as [`ConditionalGate`].
    pub fn actor(fallback: Value) -> Actor {
        Actor::control(
            vec![
                PortSpec::new(ConditionalGate::PORT_TEST),
                PortSpec::new(ConditionalGate::PORT_TASK),
            ],
            vec![PortSpec::new(ConditionalGate::PORT_OUT)],
            Self::new(fallback),
        )
        .lazy(false)
    }
}

impl ControlFlowActor for ConditionalGateWithFallback {
    fn perform_evaluation(
        &mut self,
        algo: &dyn EvalAlgorithm,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        vertex: VertexId,
    ) -> Result<()> {
        let test_in = view.in_port(vertex, ConditionalGate::PORT_TEST)?;
        let task_in = view.in_port(vertex, ConditionalGate::PORT_TASK)?;
        let out = view.out_port(vertex, ConditionalGate::PORT_OUT)?;

        eval_upstream_slice(algo, view, ctx, state, test_in)?;
        let test = state.get_data(view, test_in)?;

        if truthy(&test) {
            eval_upstream_slice(algo, view, ctx, state, task_in)?;
            let value = state.get_data(view, task_in)?;
            state.set_data(view, out, value)
        } else {
            state.set_data(view, out, self.fallback.clone())
        }
    }
}
