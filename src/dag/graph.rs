// src/dag/graph.rs

use std::fmt::Debug;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::{DiGraphMap, NodeTrait};

use crate::errors::GraphError;

/// Mutable directed graph that refuses any edge which would close a cycle.
///
/// Edges point from predecessor to successor. Acyclicity is enforced on
/// every insertion: before `from -> to` is added we search for a path
/// `to ~> from`, and if one exists the edge is rejected and the graph is
/// left untouched. Self-loops are always rejected.
///
/// Vertices are small `Copy` handles (task ids in production, integers in
/// tests); iteration order follows insertion order.
#[derive(Debug, Clone)]
pub struct DirectedGraph<N: NodeTrait> {
    inner: DiGraphMap<N, ()>,
}

impl<N: NodeTrait + Debug> DirectedGraph<N> {
    pub fn new() -> Self {
        Self {
            inner: DiGraphMap::new(),
        }
    }

    /// Add a vertex. Returns `true` if it was not present before.
    pub fn add_vertex(&mut self, v: N) -> bool {
        if self.inner.contains_node(v) {
            return false;
        }
        self.inner.add_node(v);
        true
    }

    /// Remove a vertex and every edge touching it.
    ///
    /// No edges are synthesised between its former predecessors and
    /// successors.
    pub fn remove_vertex(&mut self, v: N) -> bool {
        self.inner.remove_node(v)
    }

    /// Insert `from -> to`, adding missing vertices.
    ///
    /// Returns `Ok(false)` if the edge already existed.
    pub fn put_edge(&mut self, from: N, to: N) -> Result<bool, GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop {
                vertex: format!("{from:?}"),
            });
        }
        if self.inner.contains_edge(from, to) {
            return Ok(false);
        }

        if self.inner.contains_node(from)
            && self.inner.contains_node(to)
            && has_path_connecting(&self.inner, to, from, None)
        {
            return Err(GraphError::Cycle {
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }

        self.inner.add_edge(from, to, ());
        Ok(true)
    }

    /// Remove `from -> to`. Returns `true` if the edge existed.
    pub fn remove_edge(&mut self, from: N, to: N) -> bool {
        self.inner.remove_edge(from, to).is_some()
    }

    pub fn contains_vertex(&self, v: N) -> bool {
        self.inner.contains_node(v)
    }

    pub fn contains_edge(&self, from: N, to: N) -> bool {
        self.inner.contains_edge(from, to)
    }

    /// Direct predecessors of `v` (sources of edges ending at `v`).
    pub fn predecessors(&self, v: N) -> Vec<N> {
        if !self.inner.contains_node(v) {
            return Vec::new();
        }
        self.inner
            .neighbors_directed(v, Direction::Incoming)
            .collect()
    }

    /// Direct successors of `v` (targets of edges starting at `v`).
    pub fn successors(&self, v: N) -> Vec<N> {
        if !self.inner.contains_node(v) {
            return Vec::new();
        }
        self.inner
            .neighbors_directed(v, Direction::Outgoing)
            .collect()
    }

    pub fn vertices(&self) -> impl Iterator<Item = N> + '_ {
        self.inner.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = (N, N)> + '_ {
        self.inner.all_edges().map(|(from, to, _)| (from, to))
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// Whether `to` can be reached from `from` by following edges.
    pub fn reaches(&self, from: N, to: N) -> bool {
        self.inner.contains_node(from)
            && self.inner.contains_node(to)
            && has_path_connecting(&self.inner, from, to, None)
    }
}

impl<N: NodeTrait + Debug> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DirectedGraph<u32> {
        let mut g = DirectedGraph::new();
        for v in 1..=5 {
            g.add_vertex(v);
        }
        g.put_edge(1, 4).unwrap();
        g.put_edge(2, 3).unwrap();
        g.put_edge(2, 4).unwrap();
        g.put_edge(1, 5).unwrap();
        g.put_edge(3, 5).unwrap();
        g
    }

    #[test]
    fn counts_vertices_and_edges() {
        let g = sample();
        assert!(g.contains_vertex(3));
        assert!(!g.contains_vertex(10));
        assert_eq!(g.vertex_count(), 5);
        assert_eq!(g.edge_count(), 5);
        assert!(g.contains_edge(1, 5));
        assert!(!g.contains_edge(1, 3));
    }

    #[test]
    fn put_edge_adds_missing_vertices() {
        let mut g = DirectedGraph::new();
        g.put_edge(1, 4).unwrap();
        g.put_edge(2, 3).unwrap();
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.edge_count(), 2);
        assert!(g.contains_edge(1, 4));
        assert!(g.contains_edge(2, 3));
    }

    #[test]
    fn add_vertex_and_put_edge_are_idempotent() {
        let mut g = DirectedGraph::new();
        assert!(g.add_vertex(7));
        assert!(!g.add_vertex(7));
        assert_eq!(g.vertex_count(), 1);

        assert_eq!(g.put_edge(7, 8), Ok(true));
        assert_eq!(g.put_edge(7, 8), Ok(false));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn remove_vertex_drops_incident_edges_only() {
        let mut g = DirectedGraph::new();
        g.put_edge(1, 4).unwrap();
        g.put_edge(2, 3).unwrap();
        g.put_edge(2, 4).unwrap();
        assert!(g.remove_vertex(3));
        assert!(!g.remove_vertex(3));
        assert!(!g.contains_vertex(3));
        assert!(g.contains_edge(1, 4));
        assert!(g.contains_edge(2, 4));
        assert!(!g.contains_edge(2, 3));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn remove_edge_keeps_vertices() {
        let mut g = sample();
        assert!(g.remove_edge(1, 4));
        assert!(!g.remove_edge(1, 4));
        assert!(g.contains_vertex(1));
        assert!(g.contains_vertex(4));
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn predecessors_and_successors() {
        let g = sample();
        let mut preds = g.predecessors(5);
        preds.sort();
        assert_eq!(preds, vec![1, 3]);
        let mut succs = g.successors(2);
        succs.sort();
        assert_eq!(succs, vec![3, 4]);
        assert!(g.predecessors(42).is_empty());
    }

    #[test]
    fn rejects_edge_closing_a_cycle_and_leaves_graph_unchanged() {
        let mut g = DirectedGraph::new();
        g.put_edge(1, 4).unwrap();
        g.put_edge(2, 3).unwrap();
        g.put_edge(4, 3).unwrap();

        let err = g.put_edge(3, 1).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert_eq!(g.edge_count(), 3);
        assert!(!g.contains_edge(3, 1));

        assert!(g.add_vertex(5));
        assert_eq!(g.put_edge(3, 5), Ok(true));
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn rejects_self_loops() {
        let mut g = DirectedGraph::new();
        g.add_vertex(1);
        assert!(matches!(g.put_edge(1, 1), Err(GraphError::SelfLoop { .. })));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn reaches_follows_transitive_edges() {
        let g = sample();
        assert!(g.reaches(2, 5));
        assert!(!g.reaches(5, 2));
        assert!(!g.reaches(1, 99));
    }
}
