use std::collections::BTreeMap;

use tracing::trace;

use super::{ResolutionContext, Rule};
use crate::graph::{EdgeId, GraphState, VertexId};

/// Keeps one edge (the lowest id) per unordered pair of endpoints.
pub struct DuplicateEdgeRule;

impl Rule for DuplicateEdgeRule {
    fn id(&self) -> &str {
        "duplicate_edge"
    }

    fn name(&self) -> &str {
        "Duplicate edge suppression"
    }

    fn description(&self) -> &str {
        "Removes parallel edges joining the same two vertices"
    }

    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        for id in ctx.region_ids() {
            let mut by_neighbour: BTreeMap<VertexId, Vec<EdgeId>> = BTreeMap::new();
            for edge in state.incident_edges(id) {
                if let Some(other) = state.edge(edge).and_then(|e| e.other(id)) {
                    by_neighbour.entry(other).or_default().push(edge);
                }
            }
            for (other, mut edges) in by_neighbour {
                if edges.len() < 2 {
                    continue;
                }
                edges.sort();
                let keep = edges[0];
                for dup in &edges[1..] {
                    if state.remove_edge(*dup) {
                        trace!(removed = %dup, kept = %keep, "duplicate edge removed");
                        ctx.record_edge_replacement(*dup, keep);
                    }
                }
                ctx.mark_changed(id);
                ctx.mark_changed(other);
                ctx.include(other);
            }
        }
    }
}
