use tracing::trace;

use super::{ResolutionContext, Rule};
use crate::graph::GraphState;

/// Re-snaps free epicenter vertices to the active policy's lattice.
pub struct GridSnapRule;

impl Rule for GridSnapRule {
    fn id(&self) -> &str {
        "grid_snap"
    }

    fn name(&self) -> &str {
        "Grid snap"
    }

    fn description(&self) -> &str {
        "Moves free vertices touched by a transaction onto the active grid, unless that bends an axis-aligned edge"
    }

    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        let policy = ctx.policy();
        let epicenter: Vec<_> = ctx.epicenter().iter().copied().collect();
        for id in epicenter {
            let Some(vertex) = state.vertex(id) else {
                continue;
            };
            if !vertex.is_free() || !vertex.point.is_finite() {
                continue;
            }
            let point = vertex.point;
            let target = policy.snap(point);
            // Keep axis-aligned edges aligned, e.g. a corner under an off-grid pin
            let bends_an_edge = state
                .neighbors(id)
                .into_iter()
                .filter_map(|n| state.vertex(n).map(|v| v.point))
                .any(|n| {
                    policy.classify_direction(point, n).is_some()
                        && policy.classify_direction(target, n).is_none()
                        && !policy.coincident(target, n)
                });
            if bends_an_edge {
                continue;
            }
            if state.move_vertex(id, target) {
                trace!(vertex = %id, %target, "snapped");
                ctx.mark_changed(id);
                ctx.include(id);
            }
        }
    }
}
