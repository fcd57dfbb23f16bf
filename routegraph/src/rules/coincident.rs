use std::cmp::Ordering;

use tracing::trace;

use super::{ResolutionContext, Rule};
use crate::graph::{GraphState, VertexId};

/// Folds vertices lying within epsilon of each other into one.
///
/// Survivor precedence is pin over locked over free. Two free vertices keep
/// the guarded one, then the lower id. Two vertices of equal non-free
/// precedence are a conflict: both stay and the pair is reported.
pub struct CoincidentMergeRule;

enum Verdict {
    Merge { loser: VertexId, survivor: VertexId },
    Conflict,
}

fn judge(state: &GraphState, ctx: &ResolutionContext<'_>, a: VertexId, b: VertexId) -> Option<Verdict> {
    let va = state.vertex(a)?;
    let vb = state.vertex(b)?;
    let verdict = match va.ownership.precedence().cmp(&vb.ownership.precedence()) {
        Ordering::Greater => Verdict::Merge {
            loser: b,
            survivor: a,
        },
        Ordering::Less => Verdict::Merge {
            loser: a,
            survivor: b,
        },
        Ordering::Equal if !va.is_free() => Verdict::Conflict,
        Ordering::Equal => {
            let keep_a = match (ctx.is_guarded(a), ctx.is_guarded(b)) {
                (true, false) => true,
                (false, true) => false,
                _ => a < b,
            };
            if keep_a {
                Verdict::Merge {
                    loser: b,
                    survivor: a,
                }
            } else {
                Verdict::Merge {
                    loser: a,
                    survivor: b,
                }
            }
        }
    };
    Some(verdict)
}

impl Rule for CoincidentMergeRule {
    fn id(&self) -> &str {
        "coincident_merge"
    }

    fn name(&self) -> &str {
        "Coincident vertex merge"
    }

    fn description(&self) -> &str {
        "Merges vertices closer than the grid tolerance; pins win over free vertices"
    }

    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        let epsilon = ctx.policy().epsilon();
        for id in ctx.region_ids() {
            let Some(point) = state.vertex(id).map(|v| v.point) else {
                continue;
            };
            for other in state.vertices_within(point, epsilon) {
                if other == id || !state.contains_vertex(id) {
                    continue;
                }
                match judge(state, ctx, id, other) {
                    Some(Verdict::Merge { loser, survivor }) => {
                        if state.merge_vertex(loser, survivor) {
                            trace!(%loser, %survivor, "coincident vertices merged");
                            ctx.record_merge(loser, survivor);
                            ctx.mark_changed(loser);
                            ctx.mark_changed(survivor);
                            ctx.include(survivor);
                        }
                    }
                    Some(Verdict::Conflict) => ctx.record_conflict(id, other, point),
                    None => {}
                }
            }
        }
    }
}
