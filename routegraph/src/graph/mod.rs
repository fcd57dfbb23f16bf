//! Connectivity graph
//!
//! The owned data of a drawing's wiring: vertices (points, possibly bound to
//! component pins), edges (wire or trace segments) and the derived indices
//! that keep neighbourhood queries local.
//!
//! All mutation goes through [`GraphState`]; the indices are patched on every
//! change and can always be rebuilt from the vertex and edge tables.

pub mod connectivity;
pub mod journal;
pub mod spatial;
pub mod state;

pub use journal::JournalMark;
pub use state::GraphState;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::geometry::Point;

/// Stable vertex identifier, unique for the vertex's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u64);

/// Stable edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity of a component (symbol or footprint instance) owning pins.
/// Opaque to the graph; resolved by the surrounding domain layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Net identity shared by vertices that form one electrical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub Uuid);

impl ClusterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Copper layer or schematic sheet layer an edge lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

/// Who controls a vertex's position and lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ownership {
    /// Movable by rules, removable when isolated.
    #[default]
    Free,
    /// Bound to a component terminal.
    Pin { owner: OwnerId, pin: String },
    /// Pinned in place by the user.
    Locked,
}

impl Ownership {
    pub fn pin(owner: OwnerId, pin: impl Into<String>) -> Self {
        Ownership::Pin {
            owner,
            pin: pin.into(),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Ownership::Free)
    }

    pub fn is_pin(&self) -> bool {
        matches!(self, Ownership::Pin { .. })
    }

    pub fn owner(&self) -> Option<OwnerId> {
        match self {
            Ownership::Pin { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    /// Merge precedence: the higher value survives a coincident merge.
    pub fn precedence(&self) -> u8 {
        match self {
            Ownership::Free => 0,
            Ownership::Locked => 1,
            Ownership::Pin { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub point: Point,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterId>,
}

impl Vertex {
    /// Free vertices may be moved and culled by rules.
    pub fn is_free(&self) -> bool {
        self.ownership.is_free()
    }
}

/// Rendering attributes carried by an edge; not part of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub width: f64,
    #[serde(default)]
    pub layer: LayerId,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            layer: LayerId::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub start: VertexId,
    pub end: VertexId,
    #[serde(default)]
    pub style: EdgeStyle,
}

impl Edge {
    pub fn touches(&self, vertex: VertexId) -> bool {
        self.start == vertex || self.end == vertex
    }

    /// The endpoint opposite `vertex`, or `None` if `vertex` is not an endpoint.
    pub fn other(&self, vertex: VertexId) -> Option<VertexId> {
        if self.start == vertex {
            Some(self.end)
        } else if self.end == vertex {
            Some(self.start)
        } else {
            None
        }
    }

    /// Endpoints as an unordered pair (smaller id first).
    pub fn key(&self) -> (VertexId, VertexId) {
        if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        }
    }
}

/// Plain copy of the vertex and edge tables, as handed to renderers or
/// loaded from an external net/route description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}
