use tracing::trace;

use super::{ResolutionContext, Rule};
use crate::graph::{Edge, GraphState, VertexId};

/// Replaces two aligned segments meeting at a plain bend point with one.
///
/// Applies to a free, unguarded vertex of degree two whose edges share a
/// style, point in opposite directions along an admissible direction of the
/// active policy, and reach two distinct outer vertices.
pub struct CollinearMergeRule;

impl CollinearMergeRule {
    /// The two edges to fuse at `id`, ordered by id, if the vertex qualifies.
    fn candidate(
        state: &GraphState,
        ctx: &ResolutionContext<'_>,
        id: VertexId,
    ) -> Option<(Edge, Edge, VertexId, VertexId)> {
        let vertex = state.vertex(id)?;
        if !vertex.is_free() || ctx.is_guarded(id) || state.degree(id) != 2 {
            return None;
        }
        let mut incident: Vec<_> = state.incident_edges(id).collect();
        incident.sort();
        let first = state.edge(incident[0])?.clone();
        let second = state.edge(incident[1])?.clone();
        if first.style != second.style {
            return None;
        }
        let a = first.other(id)?;
        let b = second.other(id)?;
        if a == b {
            return None;
        }

        let policy = ctx.policy();
        let pa = state.vertex(a)?.point;
        let pv = vertex.point;
        let pb = state.vertex(b)?.point;

        let direction = policy.classify_direction(pa, pv)?;
        if !policy.is_collinear(pv, pb, direction) {
            return None;
        }
        // `b` must continue past `v`, not fold back over the first segment
        let t_v = policy.project_param(pa, direction, pv);
        let t_b = policy.project_param(pa, direction, pb);
        if t_b <= t_v + policy.epsilon() {
            return None;
        }
        Some((first, second, a, b))
    }
}

impl Rule for CollinearMergeRule {
    fn id(&self) -> &str {
        "collinear_merge"
    }

    fn name(&self) -> &str {
        "Collinear segment merge"
    }

    fn description(&self) -> &str {
        "Fuses two aligned segments meeting at a free degree-2 vertex into one"
    }

    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        for id in ctx.region_ids() {
            let Some((first, second, a, b)) = Self::candidate(state, ctx, id) else {
                continue;
            };
            // Keep the orientation of the first segment where possible
            let (start, end) = if first.end == id { (a, b) } else { (b, a) };

            state.remove_edge(first.id);
            state.remove_edge(second.id);
            state.remove_vertex(id);
            let Some(fused) = state.add_edge(start, end, first.style) else {
                continue;
            };
            trace!(vertex = %id, %fused, "collinear segments merged");
            ctx.record_edge_replacement(first.id, fused);
            ctx.record_edge_replacement(second.id, fused);
            ctx.mark_changed(id);
            ctx.mark_changed(a);
            ctx.mark_changed(b);
            ctx.include(a);
            ctx.include(b);
        }
    }
}
