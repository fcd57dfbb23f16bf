//! Connectivity analysis
//!
//! Builds a petgraph view of the wiring to answer island (connected
//! component) and reachability questions. Used for cluster labelling and
//! reporting; the mutable tables stay in [`GraphState`].

use std::collections::BTreeSet;

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graphmap::UnGraphMap;

use super::{EdgeId, GraphState, VertexId};

impl GraphState {
    /// Undirected petgraph view: vertex ids as nodes, edge ids as weights.
    pub fn to_petgraph(&self) -> UnGraphMap<VertexId, EdgeId> {
        let mut graph = UnGraphMap::with_capacity(self.vertex_count(), self.edge_count());
        for vertex in self.vertices() {
            graph.add_node(vertex.id);
        }
        for edge in self.edges() {
            graph.add_edge(edge.start, edge.end, edge.id);
        }
        graph
    }

    /// Connected groups of vertices, each sorted, ordered by smallest id.
    /// Isolated vertices form their own island.
    pub fn islands(&self) -> Vec<BTreeSet<VertexId>> {
        let graph = self.to_petgraph();
        let mut islands: Vec<BTreeSet<VertexId>> = tarjan_scc(&graph)
            .into_iter()
            .map(|component| component.into_iter().collect())
            .collect();
        islands.sort_by_key(|island| island.iter().next().copied());
        islands
    }

    /// Whether a wire path joins `a` and `b`.
    pub fn connected(&self, a: VertexId, b: VertexId) -> bool {
        if !self.contains_vertex(a) || !self.contains_vertex(b) {
            return false;
        }
        let graph = self.to_petgraph();
        has_path_connecting(&graph, a, b, None)
    }
}
