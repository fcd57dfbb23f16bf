//! Graph state: vertex and edge tables plus their derived indices.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use super::journal::{Change, Journal, JournalMark};
use super::spatial::{SpatialIndex, DEFAULT_CELL_SIZE};
use super::{
    ClusterId, Edge, EdgeId, EdgeStyle, GraphSnapshot, Ownership, Vertex, VertexId,
};
use crate::core::RouteGraphError;
use crate::geometry::{closest_on_segment, Point};

/// The wiring of one drawing.
///
/// Mutations are synchronous and never fail: an unknown id is a no-op.
/// Removing a vertex removes its incident edges first, so an edge never
/// references a missing vertex.
#[derive(Debug, Clone)]
pub struct GraphState {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
    adjacency: HashMap<VertexId, BTreeSet<EdgeId>>,
    spatial: SpatialIndex,
    next_vertex: u64,
    next_edge: u64,
    revision: u64,
    journal: Option<Journal>,
}

impl Default for GraphState {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphState {
    pub fn new() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE)
    }

    /// Empty graph whose spatial index uses buckets of `cell` units.
    pub fn with_cell_size(cell: f64) -> Self {
        Self {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            adjacency: HashMap::new(),
            spatial: SpatialIndex::new(cell),
            next_vertex: 1,
            next_edge: 1,
            revision: 0,
            journal: None,
        }
    }

    /// Load a graph from an external description, rejecting snapshots that
    /// would break referential integrity.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, RouteGraphError> {
        Self::from_snapshot_with_cell(snapshot, DEFAULT_CELL_SIZE)
    }

    pub fn from_snapshot_with_cell(
        snapshot: GraphSnapshot,
        cell: f64,
    ) -> Result<Self, RouteGraphError> {
        let mut state = Self::with_cell_size(cell);

        for vertex in snapshot.vertices {
            if !vertex.point.is_finite() {
                return Err(RouteGraphError::InvalidSnapshot(format!(
                    "vertex {} has a non-finite position",
                    vertex.id
                )));
            }
            if state.vertices.contains_key(&vertex.id) {
                return Err(RouteGraphError::InvalidSnapshot(format!(
                    "duplicate vertex id {}",
                    vertex.id
                )));
            }
            state.next_vertex = state.next_vertex.max(vertex.id.0 + 1);
            state.insert_vertex_raw(vertex);
        }

        for edge in snapshot.edges {
            if state.edges.contains_key(&edge.id) {
                return Err(RouteGraphError::InvalidSnapshot(format!(
                    "duplicate edge id {}",
                    edge.id
                )));
            }
            for endpoint in [edge.start, edge.end] {
                if !state.vertices.contains_key(&endpoint) {
                    return Err(RouteGraphError::DanglingEdge {
                        edge: edge.id,
                        vertex: endpoint,
                    });
                }
            }
            if edge.start == edge.end {
                return Err(RouteGraphError::InvalidSnapshot(format!(
                    "edge {} is a self loop on {}",
                    edge.id, edge.start
                )));
            }
            state.next_edge = state.next_edge.max(edge.id.0 + 1);
            state.insert_edge_raw(edge);
        }

        Ok(state)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            vertices: self.vertices.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// Vertices in id order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    pub fn adjacency(&self) -> &HashMap<VertexId, BTreeSet<EdgeId>> {
        &self.adjacency
    }

    pub fn incident_edges(&self, id: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|edges| edges.iter().copied())
    }

    pub fn degree(&self, id: VertexId) -> usize {
        self.adjacency.get(&id).map_or(0, |edges| edges.len())
    }

    pub fn neighbors(&self, id: VertexId) -> BTreeSet<VertexId> {
        self.incident_edges(id)
            .filter_map(|e| self.edges.get(&e))
            .filter_map(|e| e.other(id))
            .collect()
    }

    /// Lowest-id edge joining `a` and `b` in either direction.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.incident_edges(a)
            .find(|e| self.edges.get(e).and_then(|edge| edge.other(a)) == Some(b))
    }

    /// Vertices within `radius` of `point`, nearest first (ties by id).
    pub fn vertices_within(&self, point: Point, radius: f64) -> Vec<VertexId> {
        let mut hits: Vec<(f64, VertexId)> = self
            .spatial
            .candidates(point, radius)
            .into_iter()
            .filter_map(|id| {
                let d = self.vertices.get(&id)?.point.distance(point);
                (d <= radius).then_some((d, id))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    pub fn vertex_near(&self, point: Point, radius: f64) -> Option<VertexId> {
        self.vertices_within(point, radius).into_iter().next()
    }

    /// Closest edge passing within `radius` of `point`, with the closest
    /// point on it.
    pub fn edge_near(&self, point: Point, radius: f64) -> Option<(EdgeId, Point)> {
        let mut best: Option<(f64, EdgeId, Point)> = None;
        for edge in self.edges.values() {
            let (Some(a), Some(b)) = (self.vertices.get(&edge.start), self.vertices.get(&edge.end))
            else {
                continue;
            };
            let (on, _) = closest_on_segment(a.point, b.point, point);
            let d = on.distance(point);
            if d <= radius && best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, edge.id, on));
            }
        }
        best.map(|(_, id, on)| (id, on))
    }

    /// Counter bumped by every effective mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    pub fn add_vertex(&mut self, point: Point, ownership: Ownership) -> VertexId {
        let id = VertexId(self.next_vertex);
        self.next_vertex += 1;
        self.insert_vertex_raw(Vertex {
            id,
            point,
            ownership,
            cluster: None,
        });
        self.record(Change::VertexAdded(id));
        trace!(vertex = %id, %point, "vertex added");
        id
    }

    /// Removes a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        if !self.vertices.contains_key(&id) {
            return false;
        }
        let incident: Vec<EdgeId> = self.incident_edges(id).collect();
        for edge in incident {
            self.remove_edge(edge);
        }
        match self.remove_vertex_raw(id) {
            Some(vertex) => {
                self.record(Change::VertexRemoved(vertex));
                trace!(vertex = %id, "vertex removed");
                true
            }
            None => false,
        }
    }

    /// Adds an edge. Returns `None` (and changes nothing) if an endpoint is
    /// missing or both endpoints are the same vertex.
    pub fn add_edge(&mut self, start: VertexId, end: VertexId, style: EdgeStyle) -> Option<EdgeId> {
        if start == end || !self.contains_vertex(start) || !self.contains_vertex(end) {
            return None;
        }
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.insert_edge_raw(Edge {
            id,
            start,
            end,
            style,
        });
        self.record(Change::EdgeAdded(id));
        trace!(edge = %id, %start, %end, "edge added");
        Some(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> bool {
        match self.remove_edge_raw(id) {
            Some(edge) => {
                self.record(Change::EdgeRemoved(edge));
                trace!(edge = %id, "edge removed");
                true
            }
            None => false,
        }
    }

    /// Moves a vertex regardless of ownership; callers decide who may move.
    /// Returns whether the position changed.
    pub fn move_vertex(&mut self, id: VertexId, to: Point) -> bool {
        match self.vertices.get(&id) {
            Some(v) if v.point != to => {}
            _ => return false,
        }
        if let Some(from) = self.set_point_raw(id, to) {
            self.record(Change::VertexMoved { id, from });
            trace!(vertex = %id, %from, %to, "vertex moved");
            return true;
        }
        false
    }

    pub fn set_ownership(&mut self, id: VertexId, ownership: Ownership) -> bool {
        let Some(vertex) = self.vertices.get_mut(&id) else {
            return false;
        };
        if vertex.ownership == ownership {
            return false;
        }
        let from = std::mem::replace(&mut vertex.ownership, ownership);
        self.record(Change::OwnershipChanged { id, from });
        true
    }

    pub fn set_cluster(&mut self, id: VertexId, cluster: Option<ClusterId>) -> bool {
        let Some(vertex) = self.vertices.get_mut(&id) else {
            return false;
        };
        if vertex.cluster == cluster {
            return false;
        }
        let from = std::mem::replace(&mut vertex.cluster, cluster);
        self.record(Change::ClusterChanged { id, from });
        true
    }

    /// Points an existing edge at new endpoints. Refuses self loops and
    /// missing endpoints.
    pub fn repoint_edge(&mut self, id: EdgeId, start: VertexId, end: VertexId) -> bool {
        if start == end || !self.contains_vertex(start) || !self.contains_vertex(end) {
            return false;
        }
        match self.edges.get(&id) {
            Some(e) if e.start != start || e.end != end => {}
            _ => return false,
        }
        match self.repoint_raw(id, start, end) {
            Some((old_start, old_end)) => {
                self.record(Change::EdgeRepointed {
                    id,
                    start: old_start,
                    end: old_end,
                });
                true
            }
            None => false,
        }
    }

    /// Folds `loser` into `survivor`: edges are repointed, an edge joining
    /// the two is dropped, the survivor inherits the loser's cluster if it
    /// has none, and the loser is removed.
    pub fn merge_vertex(&mut self, loser: VertexId, survivor: VertexId) -> bool {
        if loser == survivor || !self.contains_vertex(loser) || !self.contains_vertex(survivor) {
            return false;
        }
        let incident: Vec<EdgeId> = self.incident_edges(loser).collect();
        for id in incident {
            let Some(edge) = self.edges.get(&id).cloned() else {
                continue;
            };
            if edge.other(loser) == Some(survivor) {
                self.remove_edge(id);
                continue;
            }
            let start = if edge.start == loser { survivor } else { edge.start };
            let end = if edge.end == loser { survivor } else { edge.end };
            self.repoint_edge(id, start, end);
        }

        let loser_cluster = self.vertices.get(&loser).and_then(|v| v.cluster);
        let survivor_cluster = self.vertices.get(&survivor).and_then(|v| v.cluster);
        if survivor_cluster.is_none() && loser_cluster.is_some() {
            self.set_cluster(survivor, loser_cluster);
        }

        trace!(%loser, %survivor, "vertices merged");
        self.remove_vertex(loser)
    }

    // ---------------------------------------------------------------------
    // Indices
    // ---------------------------------------------------------------------

    /// Recomputes adjacency and spatial buckets from the tables.
    pub fn rebuild_indices(&mut self) {
        self.adjacency.clear();
        self.spatial.clear();
        for vertex in self.vertices.values() {
            self.adjacency.insert(vertex.id, BTreeSet::new());
            self.spatial.insert(vertex.id, vertex.point);
        }
        for edge in self.edges.values() {
            for endpoint in [edge.start, edge.end] {
                self.adjacency.entry(endpoint).or_default().insert(edge.id);
            }
        }
    }

    /// Verifies referential integrity and index consistency.
    pub fn check_integrity(&self) -> Result<(), RouteGraphError> {
        for edge in self.edges.values() {
            for endpoint in [edge.start, edge.end] {
                if !self.vertices.contains_key(&endpoint) {
                    return Err(RouteGraphError::DanglingEdge {
                        edge: edge.id,
                        vertex: endpoint,
                    });
                }
                if !self
                    .adjacency
                    .get(&endpoint)
                    .is_some_and(|edges| edges.contains(&edge.id))
                {
                    return Err(RouteGraphError::Integrity(format!(
                        "adjacency of {} is missing {}",
                        endpoint, edge.id
                    )));
                }
            }
            if edge.start == edge.end {
                return Err(RouteGraphError::Integrity(format!(
                    "edge {} is a self loop",
                    edge.id
                )));
            }
        }
        if self.adjacency.len() != self.vertices.len() {
            return Err(RouteGraphError::Integrity(format!(
                "adjacency has {} entries for {} vertices",
                self.adjacency.len(),
                self.vertices.len()
            )));
        }
        for (vertex, edges) in &self.adjacency {
            if !self.vertices.contains_key(vertex) {
                return Err(RouteGraphError::Integrity(format!(
                    "adjacency entry for missing vertex {}",
                    vertex
                )));
            }
            for edge in edges {
                if !self.edges.get(edge).is_some_and(|e| e.touches(*vertex)) {
                    return Err(RouteGraphError::Integrity(format!(
                        "adjacency of {} lists unrelated edge {}",
                        vertex, edge
                    )));
                }
            }
        }
        if self.spatial.len() != self.vertices.len() {
            return Err(RouteGraphError::Integrity(format!(
                "spatial index holds {} of {} vertices",
                self.spatial.len(),
                self.vertices.len()
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Journal
    // ---------------------------------------------------------------------

    /// Opens the journal if needed and returns the current position.
    pub fn mark(&mut self) -> JournalMark {
        let journal = self.journal.get_or_insert_with(Journal::default);
        JournalMark {
            len: journal.len(),
            next_vertex: self.next_vertex,
            next_edge: self.next_edge,
        }
    }

    pub fn is_journaling(&self) -> bool {
        self.journal.is_some()
    }

    /// Drops the journal; earlier marks become unusable.
    pub fn close_journal(&mut self) {
        self.journal = None;
    }

    /// Undoes every change recorded after `mark` and returns the vertices
    /// those changes touched. A mark from a closed journal is a no-op.
    pub fn rollback_to(&mut self, mark: JournalMark) -> BTreeSet<VertexId> {
        let Some(journal) = self.journal.as_mut() else {
            return BTreeSet::new();
        };
        if mark.len > journal.len() {
            return BTreeSet::new();
        }
        let undo = journal.drain_after(mark.len);
        let mut touched = BTreeSet::new();
        for change in undo {
            touched.extend(change.vertices());
            self.revert(change);
        }
        self.next_vertex = mark.next_vertex;
        self.next_edge = mark.next_edge;
        self.revision += 1;
        touched
    }

    fn revert(&mut self, change: Change) {
        match change {
            Change::VertexAdded(id) => {
                self.remove_vertex_raw(id);
            }
            Change::VertexRemoved(vertex) => self.insert_vertex_raw(vertex),
            Change::VertexMoved { id, from } => {
                self.set_point_raw(id, from);
            }
            Change::OwnershipChanged { id, from } => {
                if let Some(v) = self.vertices.get_mut(&id) {
                    v.ownership = from;
                }
            }
            Change::ClusterChanged { id, from } => {
                if let Some(v) = self.vertices.get_mut(&id) {
                    v.cluster = from;
                }
            }
            Change::EdgeAdded(id) => {
                self.remove_edge_raw(id);
            }
            Change::EdgeRemoved(edge) => self.insert_edge_raw(edge),
            Change::EdgeRepointed { id, start, end } => {
                self.repoint_raw(id, start, end);
            }
        }
    }

    fn record(&mut self, change: Change) {
        self.revision += 1;
        if let Some(journal) = self.journal.as_mut() {
            journal.record(change);
        }
    }

    // ---------------------------------------------------------------------
    // Raw table operations (no journal, no revision)
    // ---------------------------------------------------------------------

    fn insert_vertex_raw(&mut self, vertex: Vertex) {
        self.spatial.insert(vertex.id, vertex.point);
        self.adjacency.entry(vertex.id).or_default();
        self.vertices.insert(vertex.id, vertex);
    }

    /// Only valid for isolated vertices.
    fn remove_vertex_raw(&mut self, id: VertexId) -> Option<Vertex> {
        let vertex = self.vertices.remove(&id)?;
        self.spatial.remove(id, vertex.point);
        self.adjacency.remove(&id);
        Some(vertex)
    }

    fn insert_edge_raw(&mut self, edge: Edge) {
        self.adjacency.entry(edge.start).or_default().insert(edge.id);
        self.adjacency.entry(edge.end).or_default().insert(edge.id);
        self.edges.insert(edge.id, edge);
    }

    fn remove_edge_raw(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        for endpoint in [edge.start, edge.end] {
            if let Some(edges) = self.adjacency.get_mut(&endpoint) {
                edges.remove(&id);
            }
        }
        Some(edge)
    }

    fn set_point_raw(&mut self, id: VertexId, to: Point) -> Option<Point> {
        let vertex = self.vertices.get_mut(&id)?;
        let from = std::mem::replace(&mut vertex.point, to);
        self.spatial.relocate(id, from, to);
        Some(from)
    }

    fn repoint_raw(
        &mut self,
        id: EdgeId,
        start: VertexId,
        end: VertexId,
    ) -> Option<(VertexId, VertexId)> {
        let edge = self.edges.get_mut(&id)?;
        let old = (edge.start, edge.end);
        edge.start = start;
        edge.end = end;
        for endpoint in [old.0, old.1] {
            if let Some(edges) = self.adjacency.get_mut(&endpoint) {
                edges.remove(&id);
            }
        }
        for endpoint in [start, end] {
            self.adjacency.entry(endpoint).or_default().insert(id);
        }
        Some(old)
    }
}
