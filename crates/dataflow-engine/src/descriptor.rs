//! Declarative graph descriptions.
//!
//! A [`GraphDescription`] names elements (symbolic name to actor reference),
//! connections between their named ports, initial values for unconnected
//! inputs, and optional positions. [`instantiate`] resolves the references
//! through an [`ActorFactory`] and builds a ready-to-evaluate graph plus
//! seeded state.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::{DataflowError, Result};
use crate::graph::{DataflowGraph, GraphView};
use crate::state::EvaluationState;
use crate::types::{Value, VertexId};

/// One declared edge between named elements and ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
}

/// A serializable description of a dataflow graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDescription {
    /// Symbolic element name to actor reference, resolved by the factory.
    pub elements: BTreeMap<String, String>,
    /// Declared edges, keyed by a free-form connection name.
    pub connections: BTreeMap<String, Connection>,
    /// Initial values for unconnected input ports: element to port to value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, BTreeMap<String, Value>>,
    /// Optional layout positions: element to (x, y).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub positions: BTreeMap<String, (f64, f64)>,
}

/// Resolves actor references in a graph description.
pub trait ActorFactory {
    /// Build the actor named by `reference`.
    fn create(&self, reference: &str) -> Result<Actor>;
}

impl<F> ActorFactory for F
where
    F: Fn(&str) -> Result<Actor>,
{
    fn create(&self, reference: &str) -> Result<Actor> {
        self(reference)
    }
}

/// Build a graph and seeded state from a description.
///
/// Returns the graph, a state pre-loaded with declared values and actor
/// defaults, and the element-name to vertex-id mapping. Connections or
/// values naming unknown elements fail with
/// [`DataflowError::ElementNotFound`].
pub fn instantiate(
    description: &GraphDescription,
    factory: &dyn ActorFactory,
) -> Result<(DataflowGraph, EvaluationState, HashMap<String, VertexId>)> {
    let mut graph = DataflowGraph::new();
    let mut vertices = HashMap::new();

    for (name, reference) in &description.elements {
        let actor = factory.create(reference)?;
        let vid = graph.add_actor(actor)?;
        debug!("element '{}' ({}) is vertex {}", name, reference, vid);
        vertices.insert(name.clone(), vid);
    }

    let resolve = |name: &str| -> Result<VertexId> {
        vertices
            .get(name)
            .copied()
            .ok_or_else(|| DataflowError::ElementNotFound(name.to_string()))
    };

    for connection in description.connections.values() {
        let source = graph.out_port(resolve(&connection.source)?, &connection.source_port)?;
        let target = graph.in_port(resolve(&connection.target)?, &connection.target_port)?;
        graph.connect(source, target)?;
    }

    for (name, position) in &description.positions {
        graph.set_position(resolve(name)?, *position)?;
    }

    let mut state = EvaluationState::new();
    for (name, ports) in &description.values {
        let vid = resolve(name)?;
        for (key, value) in ports {
            let pid = graph.in_port(vid, key)?;
            state.set_data(&graph, pid, value.clone())?;
        }
    }
    state.seed_defaults(&graph)?;

    Ok((graph, state, vertices))
}
