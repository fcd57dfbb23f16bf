//! routegraph - connectivity graph engine for schematic and PCB routing
//!
//! Keeps a graph of wire/trace vertices and segments normalised while an
//! editor mutates it: every mutation is a transaction, and after each one a
//! fixed pipeline of rules (grid snap, coincident merge, duplicate edge
//! removal, collinear merge, isolated vertex cull) runs over the touched
//! neighbourhood until nothing changes.
//!
//! # Quick Start
//!
//! ```
//! use routegraph::prelude::*;
//!
//! let mut session = Session::new(&PolicyConfig::manhattan(10.0), EngineOptions::default()).unwrap();
//! session.handle(RouteEvent::tap(0.0, 0.0));
//! session.handle(RouteEvent::tap(38.0, 1.0));
//! let output = session.handle(RouteEvent::Commit);
//!
//! assert!(output.committed.is_some());
//! assert_eq!(session.graph().edge_count(), 1);
//! ```
//!
//! # Layers
//!
//! - **Geometry**: points and the snapping policy (free or Manhattan grid)
//! - **Graph**: vertex/edge tables, adjacency, spatial index, rollback journal
//! - **Transactions**: atomic edits returning the epicenter they touched
//! - **Rules**: the normalisation pipeline
//! - **Engine**: applies transactions, resolves, checkpoints
//! - **Controller**: interactive routing state machine

pub mod controller;
pub mod core;
pub mod engine;
pub mod geometry;
pub mod graph;
pub mod rules;
pub mod script;
pub mod transaction;

// Re-export main types
pub use crate::core::{audit, Audit, EngineOptions, RouteGraphError, Session};
pub use controller::{
    ConnectionController, ControllerOutput, EventContext, Modifiers, RouteEvent, RouteState,
};
pub use engine::{Checkpoint, Resolution, TransactionEngine, TransactionRecord};
pub use geometry::{FreePolicy, GeometryPolicy, ManhattanGrid, Point, PolicyConfig};
pub use graph::{
    Edge, EdgeId, EdgeStyle, GraphSnapshot, GraphState, LayerId, OwnerId, Ownership, Vertex,
    VertexId,
};
pub use rules::{CullPolicy, OwnershipConflict, Rule, RulesEngine};
pub use script::{EventScript, ReplayReport, ScriptEvent};
pub use transaction::{Epicenter, Transaction, TransactionContext};

/// Load a script file and replay it (convenience wrapper).
pub fn replay_file(path: &std::path::Path) -> Result<ReplayReport, RouteGraphError> {
    let script = EventScript::from_path(path)?;
    Session::replay(&script)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::transaction::{
        AssignClusters, DeleteElement, ExtendRoute, InsertEdge, InsertVertex, MoveVertex,
        ReleasePinsOwnedBy, RouteTarget, SetOwnership, SplitEdge,
    };
    pub use crate::{
        ConnectionController, EngineOptions, GraphState, Ownership, Point, PolicyConfig,
        RouteEvent, RouteGraphError, RouteState, Session, TransactionEngine,
    };
}
