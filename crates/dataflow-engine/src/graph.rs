//! Dataflow graph model.
//!
//! A directed graph of vertices and edges where each vertex owns a set of
//! input/output ports and is optionally associated with an actor. Ports are
//! untyped slots; compatibility is the caller's responsibility.
//!
//! The read API lives on the object-safe [`GraphView`] trait so that
//! filtered projections ([`crate::subgraph::SubDataflow`]) expose the same
//! queries as the graph itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::actor::Actor;
use crate::error::{DataflowError, Result};
use crate::id::IdGenerator;
use crate::types::{EdgeId, PortDirection, PortId, VertexId};

/// Shared, interiorly mutable handle to an actor.
///
/// Actors are owned by the graph but invoked mutably during evaluation; the
/// `RefCell` borrow doubles as the per-instance re-entrancy token: a
/// composite actor re-entering its own evaluation fails the borrow and is
/// surfaced as [`DataflowError::Recursion`].
pub type ActorHandle = Rc<RefCell<Actor>>;

/// A directed named slot on a vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    /// The vertex owning this port.
    pub vertex: VertexId,
    /// Key unique among ports of the same direction on the same vertex;
    /// how an actor names its own inputs/outputs.
    pub local_id: String,
    /// Direction, fixed at creation.
    pub direction: PortDirection,
}

/// An edge from an Out port to an In port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Source Out port.
    pub source: PortId,
    /// Target In port.
    pub target: PortId,
}

#[derive(Debug, Default)]
struct VertexData {
    /// Owned ports in creation order, both directions.
    ports: Vec<PortId>,
    /// Optional associated actor.
    actor: Option<ActorHandle>,
    /// Position metadata (x, y); consumed by the default fan-in tie-break.
    position: (f64, f64),
}

/// Read-only view over a dataflow graph or a filtered projection of one.
pub trait GraphView {
    /// All visible vertex ids, ascending.
    fn vertices(&self) -> Vec<VertexId>;

    /// All visible edge ids, ascending.
    fn edges(&self) -> Vec<EdgeId>;

    /// True if the vertex is visible in this view.
    fn contains_vertex(&self, vertex: VertexId) -> bool;

    /// Look up a port.
    fn port(&self, port: PortId) -> Result<Port>;

    /// Look up an edge's endpoints.
    fn edge(&self, edge: EdgeId) -> Result<Edge>;

    /// All ports owned by a vertex, in creation order.
    fn ports(&self, vertex: VertexId) -> Result<Vec<PortId>>;

    /// Edges touching a port, in connection order.
    fn connected_edges(&self, port: PortId) -> Result<Vec<EdgeId>>;

    /// The actor associated with a vertex, if any.
    fn actor(&self, vertex: VertexId) -> Result<Option<ActorHandle>>;

    /// Position metadata of a vertex, if visible.
    fn position(&self, vertex: VertexId) -> Option<(f64, f64)>;

    /// True if the vertex is a composite boundary marker.
    fn is_boundary(&self, vertex: VertexId) -> bool;

    // -- derived queries ---------------------------------------------------

    /// The vertex owning a port.
    fn vertex_of(&self, port: PortId) -> Result<VertexId> {
        Ok(self.port(port)?.vertex)
    }

    /// In ports of a vertex, in creation order.
    fn in_ports(&self, vertex: VertexId) -> Result<Vec<PortId>> {
        self.ports_by_direction(vertex, PortDirection::In)
    }

    /// Out ports of a vertex, in creation order.
    fn out_ports(&self, vertex: VertexId) -> Result<Vec<PortId>> {
        self.ports_by_direction(vertex, PortDirection::Out)
    }

    /// Ports of a vertex with the given direction.
    fn ports_by_direction(
        &self,
        vertex: VertexId,
        direction: PortDirection,
    ) -> Result<Vec<PortId>> {
        let mut out = Vec::new();
        for pid in self.ports(vertex)? {
            if self.port(pid)?.direction == direction {
                out.push(pid);
            }
        }
        Ok(out)
    }

    /// Resolve a local key to an In port of the vertex.
    fn in_port(&self, vertex: VertexId, key: &str) -> Result<PortId> {
        self.local_port(vertex, key, PortDirection::In)
    }

    /// Resolve a local key to an Out port of the vertex.
    fn out_port(&self, vertex: VertexId, key: &str) -> Result<PortId> {
        self.local_port(vertex, key, PortDirection::Out)
    }

    /// Resolve a (vertex, local key, direction) triple to a port id.
    fn local_port(
        &self,
        vertex: VertexId,
        key: &str,
        direction: PortDirection,
    ) -> Result<PortId> {
        for pid in self.ports(vertex)? {
            let port = self.port(pid)?;
            if port.direction == direction && port.local_id == key {
                return Ok(pid);
            }
        }
        Err(DataflowError::PortNotFound(format!(
            "'{}' ({}) on vertex {}",
            key, direction, vertex
        )))
    }

    /// Ports at the other end of every edge touching this port,
    /// in connection order.
    fn connected_ports(&self, port: PortId) -> Result<Vec<PortId>> {
        let mut out = Vec::new();
        for eid in self.connected_edges(port)? {
            let edge = self.edge(eid)?;
            out.push(if edge.source == port {
                edge.target
            } else {
                edge.source
            });
        }
        Ok(out)
    }

    /// Number of edges touching a port.
    fn nb_connections(&self, port: PortId) -> Result<usize> {
        Ok(self.connected_edges(port)?.len())
    }

    /// Vertices feeding this vertex through its in ports, deduplicated,
    /// in port/connection order.
    fn in_neighbors(&self, vertex: VertexId) -> Result<Vec<VertexId>> {
        let mut out = Vec::new();
        for pid in self.in_ports(vertex)? {
            for src in self.connected_ports(pid)? {
                let owner = self.vertex_of(src)?;
                if !out.contains(&owner) {
                    out.push(owner);
                }
            }
        }
        Ok(out)
    }

    /// True if no edge leaves any Out port of the vertex.
    fn is_sink(&self, vertex: VertexId) -> Result<bool> {
        for pid in self.out_ports(vertex)? {
            if self.nb_connections(pid)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A mutable dataflow graph.
///
/// Vertex/port/edge ids are dense integers issued per graph instance; the
/// port-to-vertex relation is an index owned by the graph, never a pointer
/// stored inside the port.
#[derive(Debug, Default)]
pub struct DataflowGraph {
    vertices: HashMap<VertexId, VertexData>,
    ports: HashMap<PortId, Port>,
    edges: HashMap<EdgeId, Edge>,
    /// Edges touching each port, in connection order.
    incidence: HashMap<PortId, Vec<EdgeId>>,
    vertex_ids: IdGenerator,
    port_ids: IdGenerator,
    edge_ids: IdGenerator,
    boundary_in: Option<VertexId>,
    boundary_out: Option<VertexId>,
}

impl DataflowGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // -- vertices ----------------------------------------------------------

    /// Add a vertex and return its id.
    pub fn add_vertex(&mut self) -> VertexId {
        let vid = VertexId(self.vertex_ids.get());
        self.vertices.insert(vid, VertexData::default());
        vid
    }

    /// Add a vertex under an externally supplied id.
    pub fn add_vertex_with_id(&mut self, vertex: VertexId) -> Result<VertexId> {
        self.vertex_ids.declare(vertex.0)?;
        self.vertices.insert(vertex, VertexData::default());
        Ok(vertex)
    }

    /// Remove a vertex, cascading to its ports and their edges.
    pub fn remove_vertex(&mut self, vertex: VertexId) -> Result<()> {
        let data = self
            .vertices
            .remove(&vertex)
            .ok_or(DataflowError::VertexNotFound(vertex))?;
        for pid in data.ports {
            self.drop_port(pid);
        }
        if self.boundary_in == Some(vertex) {
            self.boundary_in = None;
        }
        if self.boundary_out == Some(vertex) {
            self.boundary_out = None;
        }
        self.vertex_ids.release(vertex.0);
        Ok(())
    }

    /// Set the position metadata of a vertex.
    pub fn set_position(&mut self, vertex: VertexId, position: (f64, f64)) -> Result<()> {
        self.vertex_mut(vertex)?.position = position;
        Ok(())
    }

    /// Designate a vertex as the composite boundary-in marker.
    pub fn set_boundary_in(&mut self, vertex: VertexId) -> Result<()> {
        self.vertex_mut(vertex)?;
        self.boundary_in = Some(vertex);
        Ok(())
    }

    /// Designate a vertex as the composite boundary-out marker.
    pub fn set_boundary_out(&mut self, vertex: VertexId) -> Result<()> {
        self.vertex_mut(vertex)?;
        self.boundary_out = Some(vertex);
        Ok(())
    }

    /// The boundary-in marker, if designated.
    pub fn boundary_in(&self) -> Option<VertexId> {
        self.boundary_in
    }

    /// The boundary-out marker, if designated.
    pub fn boundary_out(&self) -> Option<VertexId> {
        self.boundary_out
    }

    // -- ports -------------------------------------------------------------

    /// Add an In port with the given local key to a vertex.
    pub fn add_in_port(&mut self, vertex: VertexId, key: impl Into<String>) -> Result<PortId> {
        self.add_port(vertex, key.into(), PortDirection::In)
    }

    /// Add an Out port with the given local key to a vertex.
    pub fn add_out_port(&mut self, vertex: VertexId, key: impl Into<String>) -> Result<PortId> {
        self.add_port(vertex, key.into(), PortDirection::Out)
    }

    fn add_port(
        &mut self,
        vertex: VertexId,
        key: String,
        direction: PortDirection,
    ) -> Result<PortId> {
        if self.local_port(vertex, &key, direction).is_ok() {
            return Err(DataflowError::conflict(format!(
                "vertex {} already has an {} port named '{}'",
                vertex, direction, key
            )));
        }
        let data = self
            .vertices
            .get_mut(&vertex)
            .ok_or(DataflowError::VertexNotFound(vertex))?;
        let pid = PortId(self.port_ids.get());
        data.ports.push(pid);
        self.ports.insert(
            pid,
            Port {
                vertex,
                local_id: key,
                direction,
            },
        );
        self.incidence.insert(pid, Vec::new());
        Ok(pid)
    }

    /// Remove a port, cascading to all edges touching it.
    pub fn remove_port(&mut self, port: PortId) -> Result<()> {
        let owner = self
            .ports
            .get(&port)
            .ok_or_else(|| DataflowError::port_not_found(port))?
            .vertex;
        self.drop_port(port);
        if let Some(data) = self.vertices.get_mut(&owner) {
            data.ports.retain(|p| *p != port);
        }
        Ok(())
    }

    /// Drop a port and its edges without touching the owner's port list.
    fn drop_port(&mut self, port: PortId) {
        for eid in self.incidence.remove(&port).unwrap_or_default() {
            if let Some(edge) = self.edges.remove(&eid) {
                let other = if edge.source == port {
                    edge.target
                } else {
                    edge.source
                };
                if let Some(list) = self.incidence.get_mut(&other) {
                    list.retain(|e| *e != eid);
                }
                self.edge_ids.release(eid.0);
            }
        }
        self.ports.remove(&port);
        self.port_ids.release(port.0);
    }

    // -- edges -------------------------------------------------------------

    /// Connect an Out port to an In port.
    pub fn connect(&mut self, source: PortId, target: PortId) -> Result<EdgeId> {
        let src = self
            .ports
            .get(&source)
            .ok_or(DataflowError::port_not_found(source))?;
        let dst = self
            .ports
            .get(&target)
            .ok_or(DataflowError::port_not_found(target))?;
        if src.direction != PortDirection::Out {
            return Err(DataflowError::direction(format!(
                "source port {} is not an output port",
                source
            )));
        }
        if dst.direction != PortDirection::In {
            return Err(DataflowError::direction(format!(
                "target port {} is not an input port",
                target
            )));
        }
        let eid = EdgeId(self.edge_ids.get());
        self.edges.insert(eid, Edge { source, target });
        if let Some(list) = self.incidence.get_mut(&source) {
            list.push(eid);
        }
        if let Some(list) = self.incidence.get_mut(&target) {
            list.push(eid);
        }
        Ok(eid)
    }

    /// Remove the edge between two ports.
    pub fn disconnect(&mut self, source: PortId, target: PortId) -> Result<EdgeId> {
        let eid = self
            .edges
            .iter()
            .find(|(_, e)| e.source == source && e.target == target)
            .map(|(id, _)| *id)
            .ok_or_else(|| DataflowError::EdgeNotFound(format!("{} -> {}", source, target)))?;
        self.remove_edge(eid)?;
        Ok(eid)
    }

    /// Remove an edge by id.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<()> {
        let data = self
            .edges
            .remove(&edge)
            .ok_or_else(|| DataflowError::EdgeNotFound(edge.to_string()))?;
        for pid in [data.source, data.target] {
            if let Some(list) = self.incidence.get_mut(&pid) {
                list.retain(|e| *e != edge);
            }
        }
        self.edge_ids.release(edge.0);
        Ok(())
    }

    // -- actors ------------------------------------------------------------

    /// Associate an actor with a vertex.
    ///
    /// Validates that every input/output key the actor declares resolves to
    /// an existing local port of the matching direction.
    pub fn set_actor(&mut self, vertex: VertexId, actor: Actor) -> Result<()> {
        for spec in actor.inputs() {
            self.in_port(vertex, &spec.key).map_err(|_| {
                DataflowError::conflict(format!(
                    "actor declares input '{}' but vertex {} has no such in port",
                    spec.key, vertex
                ))
            })?;
        }
        for spec in actor.outputs() {
            self.out_port(vertex, &spec.key).map_err(|_| {
                DataflowError::conflict(format!(
                    "actor declares output '{}' but vertex {} has no such out port",
                    spec.key, vertex
                ))
            })?;
        }
        self.vertex_mut(vertex)?.actor = Some(Rc::new(RefCell::new(actor)));
        Ok(())
    }

    /// Remove the actor association from a vertex.
    pub fn clear_actor(&mut self, vertex: VertexId) -> Result<Option<ActorHandle>> {
        Ok(self.vertex_mut(vertex)?.actor.take())
    }

    /// Add a vertex and auto-create its ports from the actor's declared
    /// input/output layout.
    pub fn add_actor(&mut self, actor: Actor) -> Result<VertexId> {
        let vid = self.add_vertex();
        for key in actor.inputs().iter().map(|s| s.key.clone()).collect::<Vec<_>>() {
            self.add_in_port(vid, key)?;
        }
        for key in actor.outputs().iter().map(|s| s.key.clone()).collect::<Vec<_>>() {
            self.add_out_port(vid, key)?;
        }
        self.set_actor(vid, actor)?;
        Ok(vid)
    }

    fn vertex_mut(&mut self, vertex: VertexId) -> Result<&mut VertexData> {
        self.vertices
            .get_mut(&vertex)
            .ok_or(DataflowError::VertexNotFound(vertex))
    }
}

impl GraphView for DataflowGraph {
    fn vertices(&self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.vertices.keys().copied().collect();
        out.sort();
        out
    }

    fn edges(&self) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = self.edges.keys().copied().collect();
        out.sort();
        out
    }

    fn contains_vertex(&self, vertex: VertexId) -> bool {
        self.vertices.contains_key(&vertex)
    }

    fn port(&self, port: PortId) -> Result<Port> {
        self.ports
            .get(&port)
            .cloned()
            .ok_or_else(|| DataflowError::port_not_found(port))
    }

    fn edge(&self, edge: EdgeId) -> Result<Edge> {
        self.edges
            .get(&edge)
            .copied()
            .ok_or_else(|| DataflowError::EdgeNotFound(edge.to_string()))
    }

    fn ports(&self, vertex: VertexId) -> Result<Vec<PortId>> {
        self.vertices
            .get(&vertex)
            .map(|data| data.ports.clone())
            .ok_or(DataflowError::VertexNotFound(vertex))
    }

    fn connected_edges(&self, port: PortId) -> Result<Vec<EdgeId>> {
        self.incidence
            .get(&port)
            .cloned()
            .ok_or_else(|| DataflowError::port_not_found(port))
    }

    fn actor(&self, vertex: VertexId) -> Result<Option<ActorHandle>> {
        self.vertices
            .get(&vertex)
            .map(|data| data.actor.clone())
            .ok_or(DataflowError::VertexNotFound(vertex))
    }

    fn position(&self, vertex: VertexId) -> Option<(f64, f64)> {
        self.vertices.get(&vertex).map(|data| data.position)
    }

    fn is_boundary(&self, vertex: VertexId) -> bool {
        self.boundary_in == Some(vertex) || self.boundary_out == Some(vertex)
    }
}
