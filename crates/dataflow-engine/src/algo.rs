//! Evaluation algorithms.
//!
//! [`EvalAlgorithm`] is a depth-first pull-style driver: starting from a
//! vertex (or every sink), it recursively visits in-neighbors, then asks its
//! per-vertex decision hook whether to run the vertex's actor. The two stock
//! strategies differ only in that hook: [`BruteForceEvaluation`] always runs,
//! [`LazyEvaluation`] skips vertices whose inputs did not change since they
//! last ran under the current execution.

use std::collections::HashSet;

use chrono::Utc;
use log::{debug, trace};

use crate::actor::{Actor, ActorBody, OutputConvention};
use crate::context::ExecutionContext;
use crate::error::{DataflowError, Result};
use crate::graph::GraphView;
use crate::state::EvaluationState;
use crate::subgraph::SubDataflow;
use crate::types::{PortId, Value, VertexId};

/// What the per-vertex decision hook wants done with a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalDecision {
    /// Run the actor (or record a no-op run for an actorless vertex).
    Run,
    /// Do not run; the cached outputs stand.
    Skip,
    /// Already ran under the current execution; nothing to do.
    Done,
}

/// A graph evaluation strategy.
///
/// The traversal is shared; implementors supply only the per-vertex
/// [`decide`](Self::decide) hook.
pub trait EvalAlgorithm {
    /// Decide whether a visited vertex should run.
    fn decide(
        &self,
        view: &dyn GraphView,
        ctx: &ExecutionContext,
        state: &EvaluationState,
        vertex: VertexId,
    ) -> Result<EvalDecision>;

    /// Clone this strategy behind a fresh box (used to evaluate sub-slices).
    fn boxed_clone(&self) -> Box<dyn EvalAlgorithm>;

    /// View this strategy as a trait object (implementations return `self`).
    ///
    /// The shared driver hands itself to [`run_vertex`] and on to
    /// control-flow actors through this.
    fn as_dyn(&self) -> &dyn EvalAlgorithm;

    /// Evaluate the view, pulling from `start` (or from every sink).
    ///
    /// Requires an execution id on the context and a ready state (every
    /// lonely In port holding a value). After the traversal all lonely In
    /// ports are marked unchanged. When provenance is attached, the final
    /// state and the task timings are recorded under the execution once the
    /// outermost evaluation finishes — nested slice evaluations driven by
    /// control-flow actors run under the same execution id and must not
    /// persist their intermediate scratch states.
    fn eval(
        &self,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        start: Option<VertexId>,
    ) -> Result<()> {
        let Some(exec) = ctx.execution() else {
            return Err(DataflowError::not_ready(
                "no execution in progress; start one before evaluating",
            ));
        };
        if !state.is_ready_for_evaluation(view) {
            return Err(DataflowError::not_ready(
                "unconnected input ports without values remain",
            ));
        }

        debug!("evaluating under execution {} (start {:?})", exec, start);
        ctx.enter_eval();
        let mut seen = HashSet::new();
        let outcome = match start {
            Some(vertex) => self.eval_vertex(view, ctx, state, &mut seen, vertex),
            None => view.vertices().into_iter().try_for_each(|vertex| {
                if view.is_sink(vertex)? && !view.is_boundary(vertex) {
                    self.eval_vertex(view, ctx, state, &mut seen, vertex)
                } else {
                    Ok(())
                }
            }),
        };
        let outermost = ctx.exit_eval();
        outcome?;

        // External inputs are consumed by this run.
        for vertex in view.vertices() {
            for pid in view.in_ports(vertex)? {
                if view.nb_connections(pid)? == 0 {
                    state.set_changed(pid, false);
                }
            }
        }

        if outermost {
            if let Some(store) = ctx.provenance_mut() {
                if !store.has_state(exec) {
                    store.store(exec, state)?;
                    for (vertex, timing) in state.task_times() {
                        if timing.has_run() {
                            store.record_task(exec, *vertex, timing.clone())?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Visit one vertex: recurse through its in-neighbors, then apply the
    /// decision hook.
    fn eval_vertex(
        &self,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        seen: &mut HashSet<VertexId>,
        vertex: VertexId,
    ) -> Result<()> {
        if !seen.insert(vertex) {
            return Ok(());
        }
        if !view.contains_vertex(vertex) {
            return Err(DataflowError::VertexNotFound(vertex));
        }
        // A control-flow actor owns its upstream: it decides which feeding
        // slices run, so the traversal must not pull through it.
        let blocks_upstream = match view.actor(vertex)? {
            Some(handle) => handle.try_borrow().map(|a| a.is_control()).unwrap_or(true),
            None => false,
        };
        if !blocks_upstream {
            for upstream in view.in_neighbors(vertex)? {
                self.eval_vertex(view, ctx, state, seen, upstream)?;
            }
        }
        match self.decide(view, ctx, state, vertex)? {
            EvalDecision::Run => run_vertex(self.as_dyn(), view, ctx, state, vertex),
            EvalDecision::Skip => {
                trace!("skipping vertex {}", vertex);
                state.clear_task_times(vertex);
                for pid in view.out_ports(vertex)? {
                    state.set_changed(pid, false);
                }
                Ok(())
            }
            EvalDecision::Done => Ok(()),
        }
    }
}

/// Run a vertex's actor and dispatch its outputs.
///
/// An actorless vertex is a recorded no-op. A control-flow actor is handed
/// the evaluation machinery instead of resolved arguments.
pub fn run_vertex(
    algo: &dyn EvalAlgorithm,
    view: &dyn GraphView,
    ctx: &mut ExecutionContext,
    state: &mut EvaluationState,
    vertex: VertexId,
) -> Result<()> {
    let exec = ctx.current_execution()?;
    let Some(handle) = view.actor(vertex)? else {
        state.clear_task_times(vertex);
        state.set_last_execution(vertex, exec);
        return Ok(());
    };
    let mut actor = handle.try_borrow_mut().map_err(|_| {
        DataflowError::recursion(format!(
            "actor on vertex {} is already being evaluated",
            vertex
        ))
    })?;
    debug!("running vertex {} under execution {}", vertex, exec);

    if let ActorBody::ControlFlow(cf) = actor.body_mut() {
        state.set_task_start(vertex, Utc::now());
        cf.perform_evaluation(algo, view, ctx, state, vertex)?;
        state.set_task_end(vertex, Utc::now());
        state.set_last_execution(vertex, exec);
        return Ok(());
    }

    let mut inputs = Vec::with_capacity(actor.inputs().len());
    for spec in actor.inputs() {
        let pid = view.in_port(vertex, &spec.key)?;
        match state.get_data(view, pid) {
            Ok(value) => inputs.push(value),
            Err(DataflowError::NotReady(_)) if spec.default.is_some() => {
                inputs.push(spec.default.clone().unwrap_or(Value::Null));
            }
            Err(err) => return Err(err),
        }
    }

    state.set_task_start(vertex, Utc::now());
    let ret = actor.call(&inputs)?;
    state.set_task_end(vertex, Utc::now());

    dispatch_outputs(view, state, vertex, &actor, ret)?;
    state.set_last_execution(vertex, exec);
    Ok(())
}

/// Distribute an actor's return value onto its output ports.
///
/// With no outputs, only a null return is legal. With one output,
/// `SingleCombinedValue` passes the return through while `RawMultiValue`
/// unwraps a one-element sequence (a bare scalar is accepted). With several,
/// the return must be a sequence of exactly matching length, distributed in
/// declared order.
pub fn dispatch_outputs(
    view: &dyn GraphView,
    state: &mut EvaluationState,
    vertex: VertexId,
    actor: &Actor,
    ret: Value,
) -> Result<()> {
    let outputs = actor.outputs();
    match outputs.len() {
        0 => {
            if ret != Value::Null {
                return Err(DataflowError::arity(format!(
                    "vertex {} declares no outputs but returned a value",
                    vertex
                )));
            }
            Ok(())
        }
        1 => {
            let pid = view.out_port(vertex, &outputs[0].key)?;
            let value = match actor.convention() {
                OutputConvention::SingleCombinedValue => ret,
                OutputConvention::RawMultiValue => match ret {
                    Value::Array(mut items) => {
                        if items.len() != 1 {
                            return Err(DataflowError::arity(format!(
                                "vertex {} declares 1 output but returned {} values",
                                vertex,
                                items.len()
                            )));
                        }
                        items.remove(0)
                    }
                    scalar => scalar,
                },
            };
            state.set_data(view, pid, value)
        }
        n => {
            let Value::Array(items) = ret else {
                return Err(DataflowError::arity(format!(
                    "vertex {} declares {} outputs but returned a non-sequence",
                    vertex, n
                )));
            };
            if items.len() != n {
                return Err(DataflowError::arity(format!(
                    "vertex {} declares {} outputs but returned {} values",
                    vertex,
                    n,
                    items.len()
                )));
            }
            for (spec, value) in outputs.iter().zip(items) {
                let pid = view.out_port(vertex, &spec.key)?;
                state.set_data(view, pid, value)?;
            }
            Ok(())
        }
    }
}

/// Evaluate the upstream closure of an In port on a scratch copy of the
/// state, folding the results back in.
///
/// This is the primitive control-flow actors build on: it computes what
/// feeds `port` without touching the port's own vertex and without mutating
/// the host state on failure paths.
pub fn eval_upstream_slice(
    algo: &dyn EvalAlgorithm,
    view: &dyn GraphView,
    ctx: &mut ExecutionContext,
    state: &mut EvaluationState,
    port: PortId,
) -> Result<()> {
    let sub = SubDataflow::upstream(view, port)?;
    let mut scratch = state.clone();
    algo.boxed_clone().eval(&sub, ctx, &mut scratch, None)?;
    state.merge(&scratch);
    Ok(())
}

/// Recompute every visited vertex unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceEvaluation;

impl EvalAlgorithm for BruteForceEvaluation {
    fn decide(
        &self,
        _view: &dyn GraphView,
        _ctx: &ExecutionContext,
        _state: &EvaluationState,
        _vertex: VertexId,
    ) -> Result<EvalDecision> {
        Ok(EvalDecision::Run)
    }

    fn boxed_clone(&self) -> Box<dyn EvalAlgorithm> {
        Box::new(*self)
    }

    fn as_dyn(&self) -> &dyn EvalAlgorithm {
        self
    }
}

/// Recompute only what is stale.
///
/// A vertex is recomputed when it never ran, when its actor opts out of
/// laziness, or when any of its inputs changed; a vertex that already ran
/// under the current execution is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyEvaluation;

impl EvalAlgorithm for LazyEvaluation {
    fn decide(
        &self,
        view: &dyn GraphView,
        ctx: &ExecutionContext,
        state: &EvaluationState,
        vertex: VertexId,
    ) -> Result<EvalDecision> {
        if let Some(last) = state.last_execution(vertex) {
            if ctx.execution() == Some(last) {
                return Ok(EvalDecision::Done);
            }
        } else {
            return Ok(EvalDecision::Run);
        }

        let lazy = match view.actor(vertex)? {
            Some(handle) => handle
                .try_borrow()
                .map_err(|_| {
                    DataflowError::recursion(format!(
                        "actor on vertex {} is already being evaluated",
                        vertex
                    ))
                })?
                .is_lazy(),
            None => true,
        };
        if !lazy {
            return Ok(EvalDecision::Run);
        }

        for pid in view.in_ports(vertex)? {
            if state.input_has_changed(view, pid)? {
                return Ok(EvalDecision::Run);
            }
        }
        Ok(EvalDecision::Skip)
    }

    fn boxed_clone(&self) -> Box<dyn EvalAlgorithm> {
        Box::new(*self)
    }

    fn as_dyn(&self) -> &dyn EvalAlgorithm {
        self
    }
}
