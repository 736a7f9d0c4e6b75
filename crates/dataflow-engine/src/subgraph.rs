//! Read-only filtered projection of a dataflow graph.
//!
//! A [`SubDataflow`] restricts an existing graph view to an explicit vertex
//! subset: vertices, ports and edges are visible only when fully inside the
//! subset. The upstream closure of an In port — "everything that feeds this
//! port" — is the slice control-flow actors evaluate recursively.

use std::collections::{HashSet, VecDeque};

use crate::error::{DataflowError, Result};
use crate::graph::{ActorHandle, Edge, GraphView, Port};
use crate::types::{EdgeId, PortDirection, PortId, VertexId};

/// A read-only view of a graph restricted to a vertex subset.
pub struct SubDataflow<'a> {
    base: &'a dyn GraphView,
    allowed: HashSet<VertexId>,
}

impl<'a> SubDataflow<'a> {
    /// Restrict `base` to the given vertex subset.
    ///
    /// Vertices absent from `base` are ignored.
    pub fn new(base: &'a dyn GraphView, vertices: impl IntoIterator<Item = VertexId>) -> Self {
        let allowed = vertices
            .into_iter()
            .filter(|v| base.contains_vertex(*v))
            .collect();
        Self { base, allowed }
    }

    /// Compute the upstream closure of an In port.
    ///
    /// Walks backward breadth-first from the port's feeding vertices through
    /// connected ports. The port's own vertex is not part of the closure.
    /// No cycle protection is needed; cycles are precluded by the evaluation
    /// protocol.
    pub fn upstream(base: &'a dyn GraphView, port: PortId) -> Result<Self> {
        let p = base.port(port)?;
        if p.direction != PortDirection::In {
            return Err(DataflowError::direction(format!(
                "upstream closure requires an input port, {} is an output port",
                port
            )));
        }

        let mut allowed = HashSet::new();
        let mut queue: VecDeque<VertexId> = VecDeque::new();
        for src in base.connected_ports(port)? {
            let owner = base.vertex_of(src)?;
            if allowed.insert(owner) {
                queue.push_back(owner);
            }
        }
        while let Some(vertex) = queue.pop_front() {
            for pid in base.in_ports(vertex)? {
                for src in base.connected_ports(pid)? {
                    let owner = base.vertex_of(src)?;
                    if allowed.insert(owner) {
                        queue.push_back(owner);
                    }
                }
            }
        }
        Ok(Self { base, allowed })
    }

    /// The vertex subset of this view.
    pub fn vertex_set(&self) -> &HashSet<VertexId> {
        &self.allowed
    }

    fn require_vertex(&self, vertex: VertexId) -> Result<()> {
        if self.allowed.contains(&vertex) {
            Ok(())
        } else {
            Err(DataflowError::VertexNotFound(vertex))
        }
    }

    fn edge_visible(&self, edge: &Edge) -> bool {
        let src = self.base.vertex_of(edge.source);
        let dst = self.base.vertex_of(edge.target);
        matches!((src, dst), (Ok(s), Ok(d))
            if self.allowed.contains(&s) && self.allowed.contains(&d))
    }
}

impl GraphView for SubDataflow<'_> {
    fn vertices(&self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.allowed.iter().copied().collect();
        out.sort();
        out
    }

    fn edges(&self) -> Vec<EdgeId> {
        self.base
            .edges()
            .into_iter()
            .filter(|eid| {
                self.base
                    .edge(*eid)
                    .map(|e| self.edge_visible(&e))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn contains_vertex(&self, vertex: VertexId) -> bool {
        self.allowed.contains(&vertex)
    }

    fn port(&self, port: PortId) -> Result<Port> {
        let p = self.base.port(port)?;
        if self.allowed.contains(&p.vertex) {
            Ok(p)
        } else {
            Err(DataflowError::port_not_found(port))
        }
    }

    fn edge(&self, edge: EdgeId) -> Result<Edge> {
        let e = self.base.edge(edge)?;
        if self.edge_visible(&e) {
            Ok(e)
        } else {
            Err(DataflowError::EdgeNotFound(edge.to_string()))
        }
    }

    fn ports(&self, vertex: VertexId) -> Result<Vec<PortId>> {
        self.require_vertex(vertex)?;
        self.base.ports(vertex)
    }

    fn connected_edges(&self, port: PortId) -> Result<Vec<EdgeId>> {
        self.port(port)?;
        Ok(self
            .base
            .connected_edges(port)?
            .into_iter()
            .filter(|eid| {
                self.base
                    .edge(*eid)
                    .map(|e| self.edge_visible(&e))
                    .unwrap_or(false)
            })
            .collect())
    }

    fn actor(&self, vertex: VertexId) -> Result<Option<ActorHandle>> {
        self.require_vertex(vertex)?;
        self.base.actor(vertex)
    }

    fn position(&self, vertex: VertexId) -> Option<(f64, f64)> {
        if self.allowed.contains(&vertex) {
            self.base.position(vertex)
        } else {
            None
        }
    }

    fn is_boundary(&self, vertex: VertexId) -> bool {
        self.allowed.contains(&vertex) && self.base.is_boundary(vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DataflowGraph;

    /// a -> b -> c, plus d -> c on a second input.
    fn make_chain() -> (DataflowGraph, [VertexId; 4], [PortId; 4]) {
        let mut graph = DataflowGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        let d = graph.add_vertex();
        let a_out = graph.add_out_port(a, "out").unwrap();
        let b_in = graph.add_in_port(b, "in").unwrap();
        let b_out = graph.add_out_port(b, "out").unwrap();
        let c_in0 = graph.add_in_port(c, "in0").unwrap();
        let c_in1 = graph.add_in_port(c, "in1").unwrap();
        let d_out = graph.add_out_port(d, "out").unwrap();
        graph.connect(a_out, b_in).unwrap();
        graph.connect(b_out, c_in0).unwrap();
        graph.connect(d_out, c_in1).unwrap();
        (graph, [a, b, c, d], [a_out, b_in, c_in0, c_in1])
    }

    #[test]
    fn test_upstream_closure() {
        let (graph, [a, b, _c, d], [_, _, c_in0, c_in1]) = make_chain();

        let sub = SubDataflow::upstream(&graph, c_in0).unwrap();
        assert_eq!(sub.vertices(), vec![a, b]);

        let sub = SubDataflow::upstream(&graph, c_in1).unwrap();
        assert_eq!(sub.vertices(), vec![d]);
    }

    #[test]
    fn test_upstream_rejects_out_port() {
        let (graph, _, [a_out, ..]) = make_chain();
        assert!(matches!(
            SubDataflow::upstream(&graph, a_out),
            Err(DataflowError::DirectionMismatch(_))
        ));
    }

    #[test]
    fn test_upstream_of_lonely_port_is_empty() {
        let mut graph = DataflowGraph::new();
        let v = graph.add_vertex();
        let p = graph.add_in_port(v, "in").unwrap();
        let sub = SubDataflow::upstream(&graph, p).unwrap();
        assert!(sub.vertices().is_empty());
    }

    #[test]
    fn test_filtered_visibility() {
        let (graph, [a, b, c, _d], [a_out, b_in, c_in0, _]) = make_chain();
        let sub = SubDataflow::new(&graph, [a, b]);

        assert!(sub.contains_vertex(a));
        assert!(!sub.contains_vertex(c));
        assert!(sub.port(a_out).is_ok());
        assert!(matches!(
            sub.port(c_in0),
            Err(DataflowError::PortNotFound(_))
        ));
        assert!(matches!(
            sub.ports(c),
            Err(DataflowError::VertexNotFound(_))
        ));

        // Only the a -> b edge survives the filter.
        assert_eq!(sub.edges().len(), 1);
        assert_eq!(sub.connected_edges(b_in).unwrap().len(), 1);
    }

    #[test]
    fn test_edges_leaving_the_set_are_hidden() {
        let (graph, [_a, b, _c, _d], [_, b_in, ..]) = make_chain();
        // b alone: its incoming and outgoing edges both cross the boundary.
        let sub = SubDataflow::new(&graph, [b]);
        assert!(sub.edges().is_empty());
        assert_eq!(sub.nb_connections(b_in).unwrap(), 0);
    }
}
