//! Elementary graph edits.

use super::{Epicenter, Transaction, TransactionContext};
use crate::geometry::{closest_on_segment, GeometryPolicy, Point};
use crate::graph::{EdgeId, EdgeStyle, GraphState, OwnerId, Ownership, VertexId};

/// Places a vertex. Free vertices are snapped first.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertVertex {
    pub point: Point,
    pub ownership: Ownership,
}

impl InsertVertex {
    pub fn free(point: Point) -> Self {
        Self {
            point,
            ownership: Ownership::Free,
        }
    }

    pub fn pin(point: Point, owner: OwnerId, pin: impl Into<String>) -> Self {
        Self {
            point,
            ownership: Ownership::pin(owner, pin),
        }
    }
}

impl Transaction for InsertVertex {
    fn name(&self) -> &str {
        "insert_vertex"
    }

    fn apply(&self, state: &mut GraphState, ctx: &TransactionContext<'_>) -> Epicenter {
        if !self.point.is_finite() {
            return Epicenter::empty();
        }
        let point = if self.ownership.is_free() {
            ctx.policy.snap(self.point)
        } else {
            self.point
        };
        let id = state.add_vertex(point, self.ownership.clone());
        // A new vertex has no edges yet; keep it through this resolution
        Epicenter::empty().with_vertex(id).holding(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertEdge {
    pub start: VertexId,
    pub end: VertexId,
    pub style: EdgeStyle,
}

impl InsertEdge {
    pub fn new(start: VertexId, end: VertexId) -> Self {
        Self {
            start,
            end,
            style: EdgeStyle::default(),
        }
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.style = style;
        self
    }
}

impl Transaction for InsertEdge {
    fn name(&self) -> &str {
        "insert_edge"
    }

    fn apply(&self, state: &mut GraphState, _ctx: &TransactionContext<'_>) -> Epicenter {
        match state.add_edge(self.start, self.end, self.style) {
            Some(edge) => Epicenter::touching([self.start, self.end]).with_edge(edge),
            None => Epicenter::empty(),
        }
    }
}

/// Moves a free vertex (snapped). Pin-owned and locked vertices stay put.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveVertex {
    pub vertex: VertexId,
    pub to: Point,
}

impl Transaction for MoveVertex {
    fn name(&self) -> &str {
        "move_vertex"
    }

    fn apply(&self, state: &mut GraphState, ctx: &TransactionContext<'_>) -> Epicenter {
        match state.vertex(self.vertex) {
            Some(v) if v.is_free() && self.to.is_finite() => {}
            _ => return Epicenter::empty(),
        }
        let target = ctx.policy.snap(self.to);
        if !state.move_vertex(self.vertex, target) {
            return Epicenter::empty();
        }
        let mut epicenter = Epicenter::touching(state.neighbors(self.vertex));
        epicenter.touch(self.vertex);
        epicenter.vertex = Some(self.vertex);
        epicenter
    }
}

/// Deletes a vertex (with its edges) or a single edge. Former neighbours
/// land in the epicenter so they can be cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteElement {
    Vertex(VertexId),
    Edge(EdgeId),
}

impl Transaction for DeleteElement {
    fn name(&self) -> &str {
        match self {
            DeleteElement::Vertex(_) => "delete_vertex",
            DeleteElement::Edge(_) => "delete_edge",
        }
    }

    fn apply(&self, state: &mut GraphState, _ctx: &TransactionContext<'_>) -> Epicenter {
        match *self {
            DeleteElement::Vertex(id) => {
                if !state.contains_vertex(id) {
                    return Epicenter::empty();
                }
                let mut epicenter = Epicenter::touching(state.neighbors(id));
                state.remove_vertex(id);
                epicenter.touch(id);
                epicenter
            }
            DeleteElement::Edge(id) => {
                let Some((start, end)) = state.edge(id).map(|e| (e.start, e.end)) else {
                    return Epicenter::empty();
                };
                state.remove_edge(id);
                Epicenter::touching([start, end])
            }
        }
    }
}

/// Binds, locks or frees a single vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOwnership {
    pub vertex: VertexId,
    pub ownership: Ownership,
}

impl Transaction for SetOwnership {
    fn name(&self) -> &str {
        "set_ownership"
    }

    fn apply(&self, state: &mut GraphState, _ctx: &TransactionContext<'_>) -> Epicenter {
        if state.set_ownership(self.vertex, self.ownership.clone()) {
            Epicenter::empty().with_vertex(self.vertex)
        } else {
            Epicenter::empty()
        }
    }
}

/// Inserts a junction on an existing edge, replacing it by two edges.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitEdge {
    pub edge: EdgeId,
    pub at: Point,
}

impl Transaction for SplitEdge {
    fn name(&self) -> &str {
        "split_edge"
    }

    fn apply(&self, state: &mut GraphState, ctx: &TransactionContext<'_>) -> Epicenter {
        match split_edge_at(state, ctx, self.edge, self.at) {
            Some(split) => {
                let mut epicenter = Epicenter::touching(split.touched).with_vertex(split.vertex);
                epicenter.hold.insert(split.vertex);
                epicenter
            }
            None => Epicenter::empty(),
        }
    }
}

pub(crate) struct Split {
    pub vertex: VertexId,
    pub touched: Vec<VertexId>,
}

/// Splits `edge` at the point closest to `at`. When that point coincides
/// with an endpoint, the endpoint is returned and nothing changes.
/// Where a split of segment `a`-`b` near `at` lands: the grid position
/// when it still lies on the segment, otherwise the closest point.
pub fn split_point(
    a: Point,
    b: Point,
    at: Point,
    policy: &dyn GeometryPolicy,
    tolerance: f64,
) -> Point {
    let (on_segment, _) = closest_on_segment(a, b, at);
    let snapped = policy.snap(on_segment);
    let (check, _) = closest_on_segment(a, b, snapped);
    if check.distance(snapped) <= tolerance {
        snapped
    } else {
        on_segment
    }
}

pub(crate) fn split_edge_at(
    state: &mut GraphState,
    ctx: &TransactionContext<'_>,
    edge: EdgeId,
    at: Point,
) -> Option<Split> {
    let edge = state.edge(edge)?.clone();
    let a = state.vertex(edge.start)?.point;
    let b = state.vertex(edge.end)?.point;
    if !at.is_finite() {
        return None;
    }

    let point = split_point(a, b, at, ctx.policy, ctx.tolerance);

    if point.distance(a) <= ctx.tolerance {
        return Some(Split {
            vertex: edge.start,
            touched: vec![edge.start],
        });
    }
    if point.distance(b) <= ctx.tolerance {
        return Some(Split {
            vertex: edge.end,
            touched: vec![edge.end],
        });
    }

    let junction = state.add_vertex(point, Ownership::Free);
    state.remove_edge(edge.id);
    state.add_edge(edge.start, junction, edge.style);
    state.add_edge(junction, edge.end, edge.style);
    Some(Split {
        vertex: junction,
        touched: vec![edge.start, junction, edge.end],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ManhattanGrid;

    fn grid() -> ManhattanGrid {
        ManhattanGrid::new(10.0).unwrap()
    }

    #[test]
    fn test_insert_vertex_snaps_free_only() {
        let grid = grid();
        let ctx = TransactionContext::new(&grid);
        let mut state = GraphState::new();

        let ep = InsertVertex::free(Point::new(12.0, 7.0)).apply(&mut state, &ctx);
        let v = ep.vertex.unwrap();
        assert_eq!(state.vertex(v).unwrap().point, Point::new(10.0, 10.0));
        assert!(ep.hold.contains(&v));

        let ep = InsertVertex::pin(Point::new(12.0, 7.0), OwnerId::new(), "3").apply(&mut state, &ctx);
        assert_eq!(
            state.vertex(ep.vertex.unwrap()).unwrap().point,
            Point::new(12.0, 7.0)
        );

        let ep = InsertVertex::free(Point::new(f64::NAN, 0.0)).apply(&mut state, &ctx);
        assert!(ep.is_empty());
        assert_eq!(state.vertex_count(), 2);
    }

    #[test]
    fn test_move_refuses_owned_vertices() {
        let grid = grid();
        let ctx = TransactionContext::new(&grid);
        let mut state = GraphState::new();
        let locked = state.add_vertex(Point::ORIGIN, Ownership::Locked);
        let ep = MoveVertex {
            vertex: locked,
            to: Point::new(50.0, 0.0),
        }
        .apply(&mut state, &ctx);
        assert!(ep.is_empty());
        assert_eq!(state.vertex(locked).unwrap().point, Point::ORIGIN);

        let free = state.add_vertex(Point::new(0.0, 10.0), Ownership::Free);
        let ep = MoveVertex {
            vertex: free,
            to: Point::new(38.0, 11.0),
        }
        .apply(&mut state, &ctx);
        assert_eq!(ep.vertex, Some(free));
        assert_eq!(state.vertex(free).unwrap().point, Point::new(40.0, 10.0));
    }

    #[test]
    fn test_delete_edge_touches_endpoints() {
        let grid = grid();
        let ctx = TransactionContext::new(&grid);
        let mut state = GraphState::new();
        let a = state.add_vertex(Point::ORIGIN, Ownership::Free);
        let b = state.add_vertex(Point::new(10.0, 0.0), Ownership::Free);
        let e = state.add_edge(a, b, EdgeStyle::default()).unwrap();

        let ep = DeleteElement::Edge(e).apply(&mut state, &ctx);
        assert_eq!(ep.touched, [a, b].into_iter().collect());
        assert_eq!(state.edge_count(), 0);

        // Second delete is a no-op
        assert!(DeleteElement::Edge(e).apply(&mut state, &ctx).is_empty());
    }

    #[test]
    fn test_delete_vertex_touches_neighbours() {
        let grid = grid();
        let ctx = TransactionContext::new(&grid);
        let mut state = GraphState::new();
        let a = state.add_vertex(Point::ORIGIN, Ownership::Free);
        let b = state.add_vertex(Point::new(10.0, 0.0), Ownership::Free);
        state.add_edge(a, b, EdgeStyle::default());

        let ep = DeleteElement::Vertex(a).apply(&mut state, &ctx);
        assert!(ep.touched.contains(&b));
        assert!(!state.contains_vertex(a));
        assert_eq!(state.degree(b), 0);
    }

    #[test]
    fn test_split_edge() {
        let grid = grid();
        let ctx = TransactionContext::new(&grid);
        let mut state = GraphState::new();
        let a = state.add_vertex(Point::ORIGIN, Ownership::Free);
        let b = state.add_vertex(Point::new(40.0, 0.0), Ownership::Free);
        let e = state.add_edge(a, b, EdgeStyle::default()).unwrap();

        let ep = SplitEdge {
            edge: e,
            at: Point::new(21.0, 0.3),
        }
        .apply(&mut state, &ctx);
        let junction = ep.vertex.unwrap();
        assert_eq!(state.vertex(junction).unwrap().point, Point::new(20.0, 0.0));
        assert!(!state.contains_edge(e));
        assert_eq!(state.degree(junction), 2);
        assert!(state.edge_between(a, junction).is_some());
        assert!(state.edge_between(junction, b).is_some());

        // Splitting at an endpoint returns that endpoint
        let e2 = state.edge_between(a, junction).unwrap();
        let ep = SplitEdge {
            edge: e2,
            at: Point::new(0.01, 0.0),
        }
        .apply(&mut state, &ctx);
        assert_eq!(ep.vertex, Some(a));
        assert_eq!(state.vertex_count(), 3);
    }
}
