//! Actor capability.
//!
//! An actor is a callable computation unit attached to a vertex. It declares
//! its ordered input/output port layout, a laziness flag, and an output
//! convention tag that drives the arity dispatch at evaluation time. The
//! body is either a plain function or a control-flow actor that receives the
//! evaluation machinery itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algo::EvalAlgorithm;
use crate::context::ExecutionContext;
use crate::error::{DataflowError, Result};
use crate::graph::GraphView;
use crate::state::EvaluationState;
use crate::types::{Value, VertexId};

/// Declared description of one actor port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Local key the actor uses to name this port.
    pub key: String,
    /// Optional interface tag (informational; ports stay untyped).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Optional default value for unset lonely inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl PortSpec {
    /// Create a port spec with just a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            interface: None,
            default: None,
        }
    }

    /// Attach an interface tag.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Attach a default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// How an actor's return value maps onto its output ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputConvention {
    /// The return is a sequence carrying one value per output port
    /// (a bare scalar is accepted for a single port).
    RawMultiValue,
    /// The return is passed through as-is to the single output port.
    SingleCombinedValue,
}

/// A plain actor body: resolved input values in, one return value out.
pub type ActorFn = Box<dyn FnMut(&[Value]) -> Result<Value>>;

/// An actor that hijacks the default per-vertex evaluation step.
///
/// Instead of being called with ordinary arguments it receives the live
/// algorithm, graph view, context and state, so it can recursively evaluate
/// sub-graph slices (conditionals, per-element mapping).
pub trait ControlFlowActor {
    /// Evaluate the vertex, driving the machinery as needed.
    fn perform_evaluation(
        &mut self,
        algo: &dyn EvalAlgorithm,
        view: &dyn GraphView,
        ctx: &mut ExecutionContext,
        state: &mut EvaluationState,
        vertex: VertexId,
    ) -> Result<()>;
}

/// The body of an actor.
pub enum ActorBody {
    /// Ordinary callable, invoked with the resolved input values.
    Function(ActorFn),
    /// Control-flow actor driving the evaluation machinery itself.
    ControlFlow(Box<dyn ControlFlowActor>),
}

/// A callable computation unit with a declared port layout.
pub struct Actor {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    lazy: bool,
    convention: OutputConvention,
    body: ActorBody,
}

impl Actor {
    /// Plain actor returning one value per output port (`RawMultiValue`).
    pub fn function(
        inputs: Vec<PortSpec>,
        outputs: Vec<PortSpec>,
        body: impl FnMut(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs,
            lazy: true,
            convention: OutputConvention::RawMultiValue,
            body: ActorBody::Function(Box::new(body)),
        }
    }

    /// Plain actor whose raw return is the single output
    /// (`SingleCombinedValue`).
    pub fn combined(
        inputs: Vec<PortSpec>,
        output: PortSpec,
        body: impl FnMut(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs: vec![output],
            lazy: true,
            convention: OutputConvention::SingleCombinedValue,
            body: ActorBody::Function(Box::new(body)),
        }
    }

    /// Plain actor with no outputs; a non-null return is an arity error.
    pub fn sink(
        inputs: Vec<PortSpec>,
        body: impl FnMut(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs: Vec::new(),
            lazy: true,
            convention: OutputConvention::RawMultiValue,
            body: ActorBody::Function(Box::new(body)),
        }
    }

    /// Control-flow actor with an explicit port layout.
    pub fn control(
        inputs: Vec<PortSpec>,
        outputs: Vec<PortSpec>,
        body: impl ControlFlowActor + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs,
            lazy: true,
            convention: OutputConvention::RawMultiValue,
            body: ActorBody::ControlFlow(Box::new(body)),
        }
    }

    /// Toggle laziness (default true). A non-lazy actor is recomputed on
    /// every execution, even when no input changed.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Declared input ports, in call order.
    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    /// Declared output ports, in dispatch order.
    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    /// Whether the actor may be skipped when none of its inputs changed.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// The output dispatch convention.
    pub fn convention(&self) -> OutputConvention {
        self.convention
    }

    /// True if the body is a control-flow actor.
    pub fn is_control(&self) -> bool {
        matches!(self.body, ActorBody::ControlFlow(_))
    }

    /// Mutable access to the body (used by the evaluation step).
    pub fn body_mut(&mut self) -> &mut ActorBody {
        &mut self.body
    }

    /// Invoke a plain actor body with resolved input values.
    ///
    /// Control-flow actors cannot be called this way; they are handed the
    /// evaluation machinery through
    /// [`ControlFlowActor::perform_evaluation`].
    pub fn call(&mut self, inputs: &[Value]) -> Result<Value> {
        match &mut self.body {
            ActorBody::Function(f) => f(inputs),
            ActorBody::ControlFlow(_) => Err(DataflowError::Unimplemented(
                "control-flow actor invoked as a plain function",
            )),
        }
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("lazy", &self.lazy)
            .field("convention", &self.convention)
            .field("control", &self.is_control())
            .finish()
    }
}
