//! Per-execution value and bookkeeping store.
//!
//! An [`EvaluationState`] maps port ids to values plus a "changed" flag, and
//! tracks per-vertex timing and last-execution bookkeeping. Only Out ports
//! and lonely In ports (zero incoming edges) hold values directly; a
//! connected In port's value is derived by following its edges, with
//! multi-input fan-in ordered by a caller-pluggable tie-break.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::error::{DataflowError, Result};
use crate::graph::GraphView;
use crate::types::{ExecId, PortDirection, PortId, TaskTiming, Value, VertexId};

/// Comparator ordering the upstream values of a fan-in port.
pub type FanInOrder = Rc<dyn Fn(&dyn GraphView, PortId, PortId) -> Ordering>;

/// Default fan-in tie-break: x position of the owning vertex, then the raw
/// port id.
pub fn default_fan_in_order(view: &dyn GraphView, a: PortId, b: PortId) -> Ordering {
    let x_of = |pid: PortId| {
        view.port(pid)
            .ok()
            .and_then(|p| view.position(p.vertex))
            .map(|(x, _)| x)
    };
    match (x_of(a), x_of(b)) {
        (Some(xa), Some(xb)) => xa.partial_cmp(&xb).unwrap_or(Ordering::Equal).then(a.cmp(&b)),
        _ => a.cmp(&b),
    }
}

/// True if the vertex's actor declares a default for the given In port.
fn has_default(view: &dyn GraphView, vertex: VertexId, port: PortId) -> bool {
    let Ok(Some(handle)) = view.actor(vertex) else {
        return false;
    };
    let Ok(actor) = handle.try_borrow() else {
        return false;
    };
    let Ok(p) = view.port(port) else {
        return false;
    };
    actor
        .inputs()
        .iter()
        .any(|spec| spec.key == p.local_id && spec.default.is_some())
}

/// Value store and per-vertex bookkeeping for one evaluation run.
pub struct EvaluationState {
    values: HashMap<PortId, Value>,
    changed: HashMap<PortId, bool>,
    last_execution: HashMap<VertexId, ExecId>,
    task_times: HashMap<VertexId, TaskTiming>,
    fan_in_order: FanInOrder,
}

impl Default for EvaluationState {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EvaluationState {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            changed: self.changed.clone(),
            last_execution: self.last_execution.clone(),
            task_times: self.task_times.clone(),
            fan_in_order: Rc::clone(&self.fan_in_order),
        }
    }
}

impl fmt::Debug for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationState")
            .field("values", &self.values)
            .field("changed", &self.changed)
            .field("last_execution", &self.last_execution)
            .field("task_times", &self.task_times)
            .finish()
    }
}

impl EvaluationState {
    /// Create an empty state with the default fan-in tie-break.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            changed: HashMap::new(),
            last_execution: HashMap::new(),
            task_times: HashMap::new(),
            fan_in_order: Rc::new(default_fan_in_order),
        }
    }

    /// Replace the fan-in tie-break used to order multi-connected inputs.
    pub fn set_fan_in_order(
        &mut self,
        order: impl Fn(&dyn GraphView, PortId, PortId) -> Ordering + 'static,
    ) {
        self.fan_in_order = Rc::new(order);
    }

    // -- values ------------------------------------------------------------

    /// Resolve the value seen at a port.
    ///
    /// A directly stored value wins. An Out port without one is unset. A
    /// connected In port derives its value from the Out ports feeding it:
    /// exactly one connection yields that value, several yield an ordered
    /// list of them.
    pub fn get_data(&self, view: &dyn GraphView, port: PortId) -> Result<Value> {
        if let Some(value) = self.values.get(&port) {
            return Ok(value.clone());
        }
        let p = view.port(port)?;
        match p.direction {
            PortDirection::Out => Err(DataflowError::not_ready(format!(
                "output port {} holds no value",
                port
            ))),
            PortDirection::In => {
                let mut sources = view.connected_ports(port)?;
                match sources.len() {
                    0 => Err(DataflowError::not_ready(format!(
                        "input port {} holds no value",
                        port
                    ))),
                    1 => self.get_data(view, sources[0]),
                    _ => {
                        sources.sort_by(|a, b| (self.fan_in_order)(view, *a, *b));
                        let mut items = Vec::with_capacity(sources.len());
                        for src in sources {
                            items.push(self.get_data(view, src)?);
                        }
                        Ok(Value::Array(items))
                    }
                }
            }
        }
    }

    /// Store a value on a port and mark it changed.
    ///
    /// Legal only for Out ports and lonely In ports.
    pub fn set_data(&mut self, view: &dyn GraphView, port: PortId, value: Value) -> Result<()> {
        let p = view.port(port)?;
        if p.direction == PortDirection::In && view.nb_connections(port)? > 0 {
            return Err(DataflowError::direction(format!(
                "input port {} is connected; its value is derived, not stored",
                port
            )));
        }
        self.values.insert(port, value);
        self.changed.insert(port, true);
        Ok(())
    }

    /// The directly stored value of a port, if any (no derivation).
    pub fn value(&self, port: PortId) -> Option<&Value> {
        self.values.get(&port)
    }

    /// The changed flag of a port (unset ports report false).
    pub fn has_changed(&self, port: PortId) -> bool {
        self.changed.get(&port).copied().unwrap_or(false)
    }

    /// Force a port's changed flag.
    pub fn set_changed(&mut self, port: PortId, changed: bool) {
        self.changed.insert(port, changed);
    }

    /// True if any value feeding this In port is flagged changed, or — for
    /// a lonely In port — if its own flag is set.
    pub fn input_has_changed(&self, view: &dyn GraphView, port: PortId) -> Result<bool> {
        let p = view.port(port)?;
        if p.direction != PortDirection::In {
            return Err(DataflowError::direction(format!(
                "port {} is not an input port",
                port
            )));
        }
        let sources = view.connected_ports(port)?;
        if sources.is_empty() {
            Ok(self.has_changed(port))
        } else {
            Ok(sources.iter().any(|src| self.has_changed(*src)))
        }
    }

    // -- readiness ---------------------------------------------------------

    /// True iff every lonely In port in the view has a value, either stored
    /// or available as an actor-declared default.
    pub fn is_ready_for_evaluation(&self, view: &dyn GraphView) -> bool {
        for vertex in view.vertices() {
            let Ok(ports) = view.in_ports(vertex) else {
                continue;
            };
            for pid in ports {
                let lonely = view.nb_connections(pid).map(|n| n == 0).unwrap_or(false);
                if lonely
                    && !self.values.contains_key(&pid)
                    && !has_default(view, vertex, pid)
                {
                    return false;
                }
            }
        }
        true
    }

    /// True iff ready and every Out port in the view has a value.
    pub fn is_valid(&self, view: &dyn GraphView) -> bool {
        if !self.is_ready_for_evaluation(view) {
            return false;
        }
        for vertex in view.vertices() {
            let Ok(ports) = view.out_ports(vertex) else {
                continue;
            };
            for pid in ports {
                if !self.values.contains_key(&pid) {
                    return false;
                }
            }
        }
        true
    }

    /// Seed actor-declared defaults into unset lonely In ports.
    pub fn seed_defaults(&mut self, view: &dyn GraphView) -> Result<()> {
        for vertex in view.vertices() {
            let Some(handle) = view.actor(vertex)? else {
                continue;
            };
            let actor = handle
                .try_borrow()
                .map_err(|_| DataflowError::recursion(format!("actor on vertex {} is busy", vertex)))?;
            for spec in actor.inputs() {
                let Some(default) = spec.default.clone() else {
                    continue;
                };
                let pid = view.in_port(vertex, &spec.key)?;
                if view.nb_connections(pid)? == 0 && !self.values.contains_key(&pid) {
                    self.set_data(view, pid, default)?;
                }
            }
        }
        Ok(())
    }

    /// Drop all stored values and flags except those on lonely In ports,
    /// and clear all per-vertex bookkeeping.
    ///
    /// Used to re-run the same graph with fresh outputs but retained
    /// external inputs.
    pub fn reinit(&mut self, view: &dyn GraphView) -> Result<()> {
        let mut keep: HashMap<PortId, (Value, bool)> = HashMap::new();
        for vertex in view.vertices() {
            for pid in view.in_ports(vertex)? {
                if view.nb_connections(pid)? == 0 {
                    if let Some(value) = self.values.get(&pid) {
                        keep.insert(pid, (value.clone(), self.has_changed(pid)));
                    }
                }
            }
        }
        self.values.clear();
        self.changed.clear();
        self.last_execution.clear();
        self.task_times.clear();
        for (pid, (value, changed)) in keep {
            self.values.insert(pid, value);
            self.changed.insert(pid, changed);
        }
        Ok(())
    }

    /// Copy every entry of `other` into this state, overwriting existing
    /// entries. Used by control-flow actors to fold sub-evaluation results
    /// back into the host state.
    pub fn merge(&mut self, other: &EvaluationState) {
        for (pid, value) in &other.values {
            self.values.insert(*pid, value.clone());
        }
        for (pid, changed) in &other.changed {
            self.changed.insert(*pid, *changed);
        }
        for (vid, exec) in &other.last_execution {
            self.last_execution.insert(*vid, *exec);
        }
        for (vid, timing) in &other.task_times {
            self.task_times.insert(*vid, timing.clone());
        }
    }

    /// All stored (port, value, changed) entries, sorted by port id.
    pub fn items(&self) -> Vec<(PortId, Value, bool)> {
        let mut out: Vec<(PortId, Value, bool)> = self
            .values
            .iter()
            .map(|(pid, value)| (*pid, value.clone(), self.has_changed(*pid)))
            .collect();
        out.sort_by_key(|(pid, _, _)| *pid);
        out
    }

    /// Restore one raw entry (used when loading provenance snapshots).
    pub fn restore(&mut self, port: PortId, value: Value, changed: bool) {
        self.values.insert(port, value);
        self.changed.insert(port, changed);
    }

    // -- per-vertex bookkeeping --------------------------------------------

    /// The execution under which a vertex last ran, if any.
    pub fn last_execution(&self, vertex: VertexId) -> Option<ExecId> {
        self.last_execution.get(&vertex).copied()
    }

    /// Record the execution a vertex ran under.
    pub fn set_last_execution(&mut self, vertex: VertexId, exec: ExecId) {
        self.last_execution.insert(vertex, exec);
    }

    /// Forget that a vertex ever ran (forces recomputation under lazy
    /// evaluation).
    pub fn clear_last_execution(&mut self, vertex: VertexId) {
        self.last_execution.remove(&vertex);
    }

    /// The task timing recorded for a vertex, if any.
    pub fn task_time(&self, vertex: VertexId) -> Option<&TaskTiming> {
        self.task_times.get(&vertex)
    }

    /// All recorded task timings.
    pub fn task_times(&self) -> &HashMap<VertexId, TaskTiming> {
        &self.task_times
    }

    /// Record the start timestamp of a vertex's task.
    pub fn set_task_start(&mut self, vertex: VertexId, at: DateTime<Utc>) {
        self.task_times.entry(vertex).or_default().start = Some(at);
    }

    /// Record the end timestamp of a vertex's task.
    pub fn set_task_end(&mut self, vertex: VertexId, at: DateTime<Utc>) {
        self.task_times.entry(vertex).or_default().end = Some(at);
    }

    /// Reset a vertex's task timestamps to "not run".
    pub fn clear_task_times(&mut self, vertex: VertexId) {
        self.task_times.insert(vertex, TaskTiming::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DataflowGraph;

    #[test]
    fn test_get_data_direct_and_unset() {
        let mut graph = DataflowGraph::new();
        let v = graph.add_vertex();
        let out = graph.add_out_port(v, "out").unwrap();
        let mut state = EvaluationState::new();

        assert!(matches!(
            state.get_data(&graph, out),
            Err(DataflowError::NotReady(_))
        ));
        state.set_data(&graph, out, Value::from(7)).unwrap();
        assert_eq!(state.get_data(&graph, out).unwrap(), Value::from(7));
        assert!(state.has_changed(out));
    }

    #[test]
    fn test_get_data_follows_single_edge() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_in = graph.add_in_port(b, "in").unwrap();
        graph.connect(a_out, b_in).unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, a_out, Value::from("x")).unwrap();
        assert_eq!(state.get_data(&graph, b_in).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_fan_in_returns_ordered_list() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_out = graph.add_out_port(b, "out").unwrap();
        let c_in = graph.add_in_port(c, "in").unwrap();
        graph.connect(b_out, c_in).unwrap();
        graph.connect(a_out, c_in).unwrap();
        // Positions drive the default tie-break: a left of b.
        graph.set_position(a, (0.0, 0.0)).unwrap();
        graph.set_position(b, (10.0, 0.0)).unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, a_out, Value::from(1)).unwrap();
        state.set_data(&graph, b_out, Value::from(2)).unwrap();

        let got = state.get_data(&graph, c_in).unwrap();
        assert_eq!(got, serde_json::json!([1, 2]));
        // Deterministic across repeated calls.
        assert_eq!(state.get_data(&graph, c_in).unwrap(), got);
    }

    #[test]
    fn test_fan_in_custom_tie_break() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_out = graph.add_out_port(b, "out").unwrap();
        let c_in = graph.add_in_port(c, "in").unwrap();
        graph.connect(a_out, c_in).unwrap();
        graph.connect(b_out, c_in).unwrap();

        let mut state = EvaluationState::new();
        // Reverse port-id order.
        state.set_fan_in_order(|_view, x, y| y.cmp(&x));
        state.set_data(&graph, a_out, Value::from(1)).unwrap();
        state.set_data(&graph, b_out, Value::from(2)).unwrap();

        assert_eq!(state.get_data(&graph, c_in).unwrap(), serde_json::json!([2, 1]));
    }

    #[test]
    fn test_set_data_rejects_connected_input() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_in = graph.add_in_port(b, "in").unwrap();
        graph.connect(a_out, b_in).unwrap();

        let mut state = EvaluationState::new();
        assert!(matches!(
            state.set_data(&graph, b_in, Value::Null),
            Err(DataflowError::DirectionMismatch(_))
        ));
    }

    #[test]
    fn test_readiness_and_validity() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let a_in = graph.add_in_port(a, "in").unwrap();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_in = graph.add_in_port(b, "in").unwrap();
        graph.connect(a_out, b_in).unwrap();

        let mut state = EvaluationState::new();
        assert!(!state.is_ready_for_evaluation(&graph));

        state.set_data(&graph, a_in, Value::from(1)).unwrap();
        assert!(state.is_ready_for_evaluation(&graph));
        assert!(!state.is_valid(&graph));

        state.set_data(&graph, a_out, Value::from(2)).unwrap();
        assert!(state.is_valid(&graph));
    }

    #[test]
    fn test_reinit_keeps_lonely_inputs() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let a_in = graph.add_in_port(a, "in").unwrap();
        let a_out = graph.add_out_port(a, "out").unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, a_in, Value::from("seed")).unwrap();
        state.set_data(&graph, a_out, Value::from(9)).unwrap();
        state.set_last_execution(a, ExecId(0));
        state.set_task_start(a, Utc::now());

        state.reinit(&graph).unwrap();

        assert_eq!(state.get_data(&graph, a_in).unwrap(), Value::from("seed"));
        assert!(state.value(a_out).is_none());
        assert!(state.last_execution(a).is_none());
        assert!(state.task_time(a).is_none());
    }

    #[test]
    fn test_input_has_changed() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_in = graph.add_in_port(b, "in").unwrap();
        let b_extra = graph.add_in_port(b, "extra").unwrap();
        graph.connect(a_out, b_in).unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, a_out, Value::from(1)).unwrap();
        assert!(state.input_has_changed(&graph, b_in).unwrap());

        state.set_changed(a_out, false);
        assert!(!state.input_has_changed(&graph, b_in).unwrap());

        // Lonely input consults its own flag.
        state.set_data(&graph, b_extra, Value::from(2)).unwrap();
        assert!(state.input_has_changed(&graph, b_extra).unwrap());
        state.set_changed(b_extra, false);
        assert!(!state.input_has_changed(&graph, b_extra).unwrap());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, a_out, Value::from(1)).unwrap();

        let mut scratch = state.clone();
        scratch.set_data(&graph, a_out, Value::from(2)).unwrap();
        scratch.set_last_execution(a, ExecId(5));

        state.merge(&scratch);
        assert_eq!(state.value(a_out), Some(&Value::from(2)));
        assert_eq!(state.last_execution(a), Some(ExecId(5)));
    }

    #[test]
    fn test_items_sorted_snapshot() {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let p0 = graph.add_out_port(a, "x").unwrap();
        let p1 = graph.add_out_port(a, "y").unwrap();

        let mut state = EvaluationState::new();
        state.set_data(&graph, p1, Value::from("b")).unwrap();
        state.set_data(&graph, p0, Value::from("a")).unwrap();

        let items = state.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, p0);
        assert_eq!(items[1].0, p1);
    }

    #[test]
    fn test_seed_defaults() {
        use crate::actor::{Actor, PortSpec};

        let mut graph = DataflowGraph::new();
        let actor = Actor::function(
            vec![PortSpec::new("in").with_default(Value::from(42))],
            vec![PortSpec::new("out")],
            |inputs: &[Value]| Ok(inputs[0].clone()),
        );
        let v = graph.add_actor(actor).unwrap();
        let v_in = graph.in_port(v, "in").unwrap();

        let mut state = EvaluationState::new();
        // The declared default already counts as ready...
        assert!(state.is_ready_for_evaluation(&graph));
        assert!(state.value(v_in).is_none());
        // ...and seeding materializes it as a stored value.
        state.seed_defaults(&graph).unwrap();
        assert_eq!(state.get_data(&graph, v_in).unwrap(), Value::from(42));
    }
}
