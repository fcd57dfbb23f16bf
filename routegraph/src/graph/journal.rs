//! Change journal
//!
//! While a journal is open every primitive mutation of [`GraphState`] records
//! what it overwrote. Rolling back to a [`JournalMark`] replays those records
//! in reverse, which restores the vertex and edge tables exactly, ids
//! included.
//!
//! [`GraphState`]: super::GraphState

use super::{ClusterId, Edge, EdgeId, Ownership, Vertex, VertexId};
use crate::geometry::Point;

/// One primitive change and the data needed to reverse it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    VertexAdded(VertexId),
    VertexRemoved(Vertex),
    VertexMoved { id: VertexId, from: Point },
    OwnershipChanged { id: VertexId, from: Ownership },
    ClusterChanged { id: VertexId, from: Option<ClusterId> },
    EdgeAdded(EdgeId),
    EdgeRemoved(Edge),
    EdgeRepointed {
        id: EdgeId,
        start: VertexId,
        end: VertexId,
    },
}

impl Change {
    /// Vertices whose observable state this change affects.
    pub(crate) fn vertices(&self) -> Vec<VertexId> {
        match self {
            Change::VertexAdded(id) => vec![*id],
            Change::VertexRemoved(v) => vec![v.id],
            Change::VertexMoved { id, .. }
            | Change::OwnershipChanged { id, .. }
            | Change::ClusterChanged { id, .. } => vec![*id],
            Change::EdgeAdded(_) => Vec::new(),
            Change::EdgeRemoved(e) => vec![e.start, e.end],
            Change::EdgeRepointed { start, end, .. } => vec![*start, *end],
        }
    }
}

/// Position in the journal plus the id counters at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalMark {
    pub(crate) len: usize,
    pub(crate) next_vertex: u64,
    pub(crate) next_edge: u64,
}

impl JournalMark {
    /// Number of journal entries recorded before this mark.
    pub fn position(&self) -> usize {
        self.len
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    changes: Vec<Change>,
}

impl Journal {
    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub(crate) fn len(&self) -> usize {
        self.changes.len()
    }

    /// Removes and returns the changes recorded after `len`, newest first.
    pub(crate) fn drain_after(&mut self, len: usize) -> Vec<Change> {
        if len >= self.changes.len() {
            return Vec::new();
        }
        let mut tail = self.changes.split_off(len);
        tail.reverse();
        tail
    }
}
