use std::collections::BTreeSet;

use super::{Epicenter, Transaction, TransactionContext};
use crate::graph::{ClusterId, GraphState};

/// Labels every connectivity island with one cluster id.
///
/// An island keeps the smallest cluster id already present on it unless an
/// earlier island claimed that id; otherwise it gets a fresh one. Only
/// labels change, so no rule pass follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignClusters;

impl Transaction for AssignClusters {
    fn name(&self) -> &str {
        "assign_clusters"
    }

    fn is_metadata_only(&self) -> bool {
        true
    }

    fn apply(&self, state: &mut GraphState, _ctx: &TransactionContext<'_>) -> Epicenter {
        let mut claimed: BTreeSet<ClusterId> = BTreeSet::new();
        let mut epicenter = Epicenter::empty();
        for island in state.islands() {
            let existing = island
                .iter()
                .filter_map(|id| state.vertex(*id).and_then(|v| v.cluster))
                .filter(|c| !claimed.contains(c))
                .min();
            let cluster = existing.unwrap_or_else(ClusterId::new);
            claimed.insert(cluster);
            for id in island {
                if state.set_cluster(id, Some(cluster)) {
                    epicenter.touch(id);
                }
            }
        }
        epicenter
    }
}
