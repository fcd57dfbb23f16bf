use tracing::trace;

use super::{ResolutionContext, Rule};
use crate::graph::GraphState;

/// Removes free vertices left without edges, unless guarded or vetoed by
/// the cull policy. Pin-owned and locked vertices are never culled.
pub struct IsolatedCullRule;

impl Rule for IsolatedCullRule {
    fn id(&self) -> &str {
        "isolated_cull"
    }

    fn name(&self) -> &str {
        "Isolated vertex cull"
    }

    fn description(&self) -> &str {
        "Deletes free vertices with no incident edges"
    }

    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        for id in ctx.region_ids() {
            let Some(vertex) = state.vertex(id) else {
                continue;
            };
            if !vertex.is_free() || state.degree(id) != 0 || !ctx.can_cull(vertex, state) {
                continue;
            }
            if state.remove_vertex(id) {
                trace!(vertex = %id, "isolated vertex culled");
                ctx.mark_changed(id);
            }
        }
    }
}
