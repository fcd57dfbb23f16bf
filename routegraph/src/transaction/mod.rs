//! Transactions
//!
//! A transaction is one named, atomic mutation of the graph. Applying it
//! returns an [`Epicenter`]: the vertices it touched, which seeds the rule
//! pipeline, plus the primary vertex or edge it created.
//!
//! Transactions never fail. Anything referring to an element that no longer
//! exists turns into an empty epicenter.

pub mod basic;
pub mod clusters;
pub mod ownership;
pub mod route;

pub use basic::{
    split_point, DeleteElement, InsertEdge, InsertVertex, MoveVertex, SetOwnership, SplitEdge,
};
pub use clusters::AssignClusters;
pub use ownership::{OwnershipAssign, OwnershipLookup, ReleasePinsOwnedBy};
pub use route::{ExtendRoute, RouteTarget};

use std::collections::BTreeSet;

use crate::geometry::GeometryPolicy;
use crate::graph::{EdgeId, GraphState, VertexId};

/// What a transaction touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Epicenter {
    /// Vertices whose neighbourhood must be re-normalised (may include
    /// vertices the transaction removed).
    pub touched: BTreeSet<VertexId>,
    /// Vertices the resolver must not remove while resolving this
    /// transaction (a freshly placed route anchor, a split point).
    pub hold: BTreeSet<VertexId>,
    /// Primary vertex created or targeted.
    pub vertex: Option<VertexId>,
    /// Primary edge created.
    pub edge: Option<EdgeId>,
}

impl Epicenter {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn touching(ids: impl IntoIterator<Item = VertexId>) -> Self {
        Self {
            touched: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_vertex(mut self, id: VertexId) -> Self {
        self.touched.insert(id);
        self.vertex = Some(id);
        self
    }

    pub fn with_edge(mut self, id: EdgeId) -> Self {
        self.edge = Some(id);
        self
    }

    pub fn holding(mut self, id: VertexId) -> Self {
        self.hold.insert(id);
        self
    }

    pub fn touch(&mut self, id: VertexId) {
        self.touched.insert(id);
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.vertex.is_none() && self.edge.is_none()
    }
}

/// Read-only environment of a transaction.
#[derive(Clone, Copy)]
pub struct TransactionContext<'a> {
    pub policy: &'a dyn GeometryPolicy,
    /// Distance under which two positions count as the same.
    pub tolerance: f64,
}

impl<'a> TransactionContext<'a> {
    pub fn new(policy: &'a dyn GeometryPolicy) -> Self {
        Self {
            policy,
            tolerance: policy.epsilon(),
        }
    }
}

pub trait Transaction {
    /// Short name for logs and the engine history.
    fn name(&self) -> &str;

    /// Pure bookkeeping changes skip rule resolution.
    fn is_metadata_only(&self) -> bool {
        false
    }

    fn apply(&self, state: &mut GraphState, ctx: &TransactionContext<'_>) -> Epicenter;
}
