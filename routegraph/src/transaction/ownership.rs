//! Ownership transitions driven by the component domain.

use super::{Epicenter, Transaction, TransactionContext};
use crate::graph::{GraphState, OwnerId, Ownership, VertexId};

/// Reads a vertex's ownership as the domain layer sees it.
pub type OwnershipLookup = Box<dyn Fn(&GraphState, VertexId) -> Option<Ownership>>;

/// Records a new ownership for a vertex. Custom implementations are
/// responsible for updating the graph as well as their own registry.
pub type OwnershipAssign = Box<dyn Fn(&mut GraphState, VertexId, Ownership)>;

/// Frees every vertex bound to a pin of `owner`, e.g. when the component is
/// deleted. The freed vertices form the epicenter, so the ones left without
/// wires are culled.
pub struct ReleasePinsOwnedBy {
    pub owner: OwnerId,
    lookup: OwnershipLookup,
    assign: OwnershipAssign,
}

impl ReleasePinsOwnedBy {
    /// Uses the ownership stored on the graph's vertices.
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            lookup: Box::new(|state: &GraphState, id: VertexId| state.vertex(id).map(|v| v.ownership.clone())),
            assign: Box::new(|state: &mut GraphState, id: VertexId, ownership: Ownership| {
                state.set_ownership(id, ownership);
            }),
        }
    }

    /// Uses domain-provided accessors instead of the graph's own table.
    pub fn with_accessors(owner: OwnerId, lookup: OwnershipLookup, assign: OwnershipAssign) -> Self {
        Self {
            owner,
            lookup,
            assign,
        }
    }
}

impl std::fmt::Debug for ReleasePinsOwnedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePinsOwnedBy")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Transaction for ReleasePinsOwnedBy {
    fn name(&self) -> &str {
        "release_pins_owned_by"
    }

    fn apply(&self, state: &mut GraphState, _ctx: &TransactionContext<'_>) -> Epicenter {
        let matches: Vec<VertexId> = state
            .vertices()
            .map(|v| v.id)
            .filter(|id| {
                (self.lookup)(state, *id).is_some_and(|o| o.owner() == Some(self.owner))
            })
            .collect();
        for id in &matches {
            (self.assign)(state, *id, Ownership::Free);
        }
        Epicenter::touching(matches)
    }
}
