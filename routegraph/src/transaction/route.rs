//! One interactive routing step.

use super::basic::split_edge_at;
use super::{Epicenter, Transaction, TransactionContext};
use crate::geometry::Point;
use crate::graph::{EdgeId, EdgeStyle, GraphState, Ownership, VertexId};

/// Where a routing step ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteTarget {
    /// An existing vertex (junction or pin).
    Vertex(VertexId),
    /// A point on an existing edge; the edge is split there.
    OnEdge { edge: EdgeId, at: Point },
    /// Open space; a free vertex is placed at the snapped point.
    Point(Point),
}

/// Lays a segment (or an elbow of two segments) from the last route
/// waypoint to a target. The target vertex is the epicenter's primary
/// vertex and the last segment its primary edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendRoute {
    pub from: VertexId,
    pub to: RouteTarget,
    pub corner: Option<Point>,
    pub style: EdgeStyle,
}

impl ExtendRoute {
    pub fn new(from: VertexId, to: RouteTarget) -> Self {
        Self {
            from,
            to,
            corner: None,
            style: EdgeStyle::default(),
        }
    }

    pub fn with_corner(mut self, corner: Option<Point>) -> Self {
        self.corner = corner;
        self
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.style = style;
        self
    }

    fn resolve_target(
        &self,
        state: &mut GraphState,
        ctx: &TransactionContext<'_>,
        epicenter: &mut Epicenter,
    ) -> Option<VertexId> {
        match self.to {
            RouteTarget::Vertex(id) => state.contains_vertex(id).then_some(id),
            RouteTarget::OnEdge { edge, at } => {
                let split = split_edge_at(state, ctx, edge, at)?;
                epicenter.touched.extend(split.touched);
                Some(split.vertex)
            }
            RouteTarget::Point(p) => {
                if !p.is_finite() {
                    return None;
                }
                Some(state.add_vertex(ctx.policy.snap(p), Ownership::Free))
            }
        }
    }
}

impl Transaction for ExtendRoute {
    fn name(&self) -> &str {
        "extend_route"
    }

    fn apply(&self, state: &mut GraphState, ctx: &TransactionContext<'_>) -> Epicenter {
        let Some(from_point) = state.vertex(self.from).map(|v| v.point) else {
            return Epicenter::empty();
        };
        let mut epicenter = Epicenter::empty();
        let Some(target) = self.resolve_target(state, ctx, &mut epicenter) else {
            return Epicenter::empty();
        };
        if target == self.from {
            return epicenter;
        }
        let Some(target_point) = state.vertex(target).map(|v| v.point) else {
            return Epicenter::empty();
        };

        // Corners are never snapped: an off-grid pin sets one of their axes.
        // A corner that no longer lines up with both ends is recomputed.
        let aligned = |c: Point| {
            ctx.policy.classify_direction(from_point, c).is_some()
                && ctx.policy.classify_direction(c, target_point).is_some()
        };
        let corner = self
            .corner
            .filter(|c| c.is_finite())
            .and_then(|c| {
                if aligned(c) {
                    Some(c)
                } else {
                    ctx.policy.elbow(from_point, target_point)
                }
            })
            .filter(|c| c.distance(from_point) > ctx.tolerance && c.distance(target_point) > ctx.tolerance);

        let last_edge = match corner {
            Some(c) => {
                let bend = state.add_vertex(c, Ownership::Free);
                epicenter.touch(bend);
                state.add_edge(self.from, bend, self.style);
                state.add_edge(bend, target, self.style)
            }
            None => state.add_edge(self.from, target, self.style),
        };

        epicenter.touch(self.from);
        let mut epicenter = epicenter.with_vertex(target).holding(target);
        epicenter.edge = last_edge;
        epicenter
    }
}
