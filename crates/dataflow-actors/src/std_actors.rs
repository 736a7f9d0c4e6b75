//! Plain value actors.
//!
//! Small building blocks used both in real dataflows and throughout the
//! test suites: constants, counters, pass-throughs and arithmetic.

use dataflow_engine::{Actor, DataflowError, PortSpec, Result, Value};

/// An actor with no inputs that always yields the given value on `out`.
///
/// Uses the combined convention so a sequence value lands on the port as-is
/// instead of being distributed element-per-port.
pub fn constant(value: Value) -> Actor {
    Actor::combined(vec![], PortSpec::new("out"), move |_| Ok(value.clone()))
}

/// A non-lazy source yielding 0, 1, 2, ... on `out`, one step per run.
///
/// Opting out of laziness makes every execution advance the counter, which
/// is what makes it useful as a staleness probe.
pub fn counter() -> Actor {
    let mut n = 0i64;
    Actor::function(vec![], vec![PortSpec::new("out")], move |_| {
        let v = n;
        n += 1;
        Ok(Value::from(v))
    })
    .lazy(false)
}

/// Copies `in` to `out`, coercing to an integer.
pub fn passthrough_int() -> Actor {
    Actor::function(
        vec![PortSpec::new("in")],
        vec![PortSpec::new("out")],
        |inputs: &[Value]| {
            let n = inputs[0].as_i64().ok_or_else(|| {
                DataflowError::arity(format!("expected an integer, got {}", inputs[0]))
            })?;
            Ok(Value::from(n))
        },
    )
}

/// Numeric addition: `a` + `b` on `out`.
pub fn add() -> Actor {
    Actor::function(
        vec![PortSpec::new("a"), PortSpec::new("b")],
        vec![PortSpec::new("out")],
        |inputs: &[Value]| {
            let a = numeric(&inputs[0])?;
            let b = numeric(&inputs[1])?;
            Ok(Value::from(a + b))
        },
    )
}

fn numeric(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| DataflowError::arity(format!("expected a number, got {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_engine::{
        BruteForceEvaluation, DataflowGraph, EvalAlgorithm, EvaluationState, ExecutionContext,
        GraphView, LazyEvaluation,
    };

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_constant_and_add() {
        init_logging();
        let mut graph = DataflowGraph::new();
        let two = graph.add_actor(constant(Value::from(2.0))).unwrap();
        let three = graph.add_actor(constant(Value::from(3.0))).unwrap();
        let sum = graph.add_actor(add()).unwrap();
        graph
            .connect(
                graph.out_port(two, "out").unwrap(),
                graph.in_port(sum, "a").unwrap(),
            )
            .unwrap();
        graph
            .connect(
                graph.out_port(three, "out").unwrap(),
                graph.in_port(sum, "b").unwrap(),
            )
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let mut state = EvaluationState::new();
        ctx.new_execution(None).unwrap();
        BruteForceEvaluation.eval(&graph, &mut ctx, &mut state, None).unwrap();

        let out = graph.out_port(sum, "out").unwrap();
        assert_eq!(state.get_data(&graph, out).unwrap(), Value::from(5.0));
    }

    #[test]
    fn test_counter_advances_per_execution_under_brute_force() {
        init_logging();
        let mut graph = DataflowGraph::new();
        let c = graph.add_actor(counter()).unwrap();
        let p = graph.add_actor(passthrough_int()).unwrap();
        graph
            .connect(
                graph.out_port(c, "out").unwrap(),
                graph.in_port(p, "in").unwrap(),
            )
            .unwrap();
        let p_out = graph.out_port(p, "out").unwrap();

        let mut ctx = ExecutionContext::new();
        let mut state = EvaluationState::new();

        for expected in 0..3i64 {
            ctx.new_execution(None).unwrap();
            BruteForceEvaluation.eval(&graph, &mut ctx, &mut state, None).unwrap();
            assert_eq!(state.get_data(&graph, p_out).unwrap(), Value::from(expected));
        }
    }

    #[test]
    fn test_counter_chain_under_lazy_matches_brute_force() {
        init_logging();
        let mut graph = DataflowGraph::new();
        let c = graph.add_actor(counter()).unwrap();
        let p = graph.add_actor(passthrough_int()).unwrap();
        graph
            .connect(
                graph.out_port(c, "out").unwrap(),
                graph.in_port(p, "in").unwrap(),
            )
            .unwrap();
        let p_out = graph.out_port(p, "out").unwrap();

        let mut ctx = ExecutionContext::new();
        let mut state = EvaluationState::new();

        ctx.new_execution(None).unwrap();
        LazyEvaluation.eval(&graph, &mut ctx, &mut state, None).unwrap();
        assert_eq!(state.get_data(&graph, p_out).unwrap(), Value::from(0));

        ctx.new_execution(None).unwrap();
        LazyEvaluation.eval(&graph, &mut ctx, &mut state, None).unwrap();
        assert_eq!(state.get_data(&graph, p_out).unwrap(), Value::from(1));
    }

    #[test]
    fn test_constant_preserves_sequence_values() {
        init_logging();
        let mut graph = DataflowGraph::new();
        let items = serde_json::json!([1, 2, 3]);
        let c = graph.add_actor(constant(items.clone())).unwrap();
        let c_out = graph.out_port(c, "out").unwrap();

        let mut ctx = ExecutionContext::new();
        let mut state = EvaluationState::new();
        ctx.new_execution(None).unwrap();
        BruteForceEvaluation.eval(&graph, &mut ctx, &mut state, None).unwrap();

        // The sequence must land on the single port intact, not be
        // distributed element-per-port.
        assert_eq!(state.get_data(&graph, c_out).unwrap(), items);
    }

    #[test]
    fn test_passthrough_rejects_non_integer() {
        init_logging();
        let mut graph = DataflowGraph::new();
        let s = graph.add_actor(constant(Value::from("nope"))).unwrap();
        let p = graph.add_actor(passthrough_int()).unwrap();
        graph
            .connect(
                graph.out_port(s, "out").unwrap(),
                graph.in_port(p, "in").unwrap(),
            )
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let mut state = EvaluationState::new();
        ctx.new_execution(None).unwrap();
        assert!(BruteForceEvaluation.eval(&graph, &mut ctx, &mut state, None).is_err());
    }
}
