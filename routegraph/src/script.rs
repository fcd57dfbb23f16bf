//! Recorded event scripts and replay reports.
//!
//! A script is a JSON document holding a policy, engine options, an
//! optional starting graph and a list of controller events:
//!
//! ```json
//! {
//!   "policy": { "kind": "manhattan", "step": 10.0 },
//!   "events": [
//!     { "type": "tap", "x": 0.0, "y": 0.0 },
//!     { "type": "tap", "x": 10.0, "y": 0.0 },
//!     { "type": "escape" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controller::{ControllerOutput, EventContext, Modifiers, RouteEvent, RouteState};
use crate::core::{EngineOptions, RouteGraphError};
use crate::geometry::{PolicyConfig, Point};
use crate::graph::{EdgeId, GraphSnapshot, LayerId, VertexId};
use crate::rules::OwnershipConflict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventScript {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub options: EngineOptions,
    #[serde(default)]
    pub snapshot: Option<GraphSnapshot>,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

impl EventScript {
    pub fn from_path(path: &Path) -> Result<Self, RouteGraphError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn to_json(&self) -> Result<String, RouteGraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromStr for EventScript {
    type Err = RouteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Pointer fields shared by `tap` and `move`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerInput {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub layer: LayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
}

impl PointerInput {
    fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    fn context(&self) -> EventContext {
        let defaults = EventContext::default();
        EventContext {
            layer: self.layer,
            width: self.width.unwrap_or(defaults.width),
            modifiers: Modifiers {
                shift: self.shift,
                alt: self.alt,
                ctrl: self.ctrl,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    Tap(PointerInput),
    Move(PointerInput),
    Backspace,
    Escape,
    Commit,
}

impl ScriptEvent {
    pub fn to_event(&self) -> RouteEvent {
        match self {
            ScriptEvent::Tap(input) => RouteEvent::Tap {
                point: input.point(),
                context: input.context(),
            },
            ScriptEvent::Move(input) => RouteEvent::Move {
                point: input.point(),
                context: input.context(),
            },
            ScriptEvent::Backspace => RouteEvent::Backspace,
            ScriptEvent::Escape => RouteEvent::Escape,
            ScriptEvent::Commit => RouteEvent::Commit,
        }
    }
}

/// What one replayed event did.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub index: usize,
    pub event: String,
    pub state: RouteState,
    pub changed: Vec<VertexId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed: Option<EdgeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<OwnershipConflict>,
}

impl EventSummary {
    pub fn new(
        index: usize,
        event: &ScriptEvent,
        output: &ControllerOutput,
        state: RouteState,
    ) -> Self {
        Self {
            index,
            event: event.to_event().name().to_string(),
            state,
            changed: output.changed.iter().copied().collect(),
            committed: output.committed,
            preview: output.preview.clone(),
            conflicts: output.conflicts.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub policy: PolicyConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub events: Vec<EventSummary>,
    pub final_state: RouteState,
    pub transactions_applied: usize,
    pub islands: usize,
    pub graph: GraphSnapshot,
}

impl ReplayReport {
    pub fn committed_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.events.iter().filter_map(|e| e.committed)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &OwnershipConflict> {
        self.events.iter().flat_map(|e| e.conflicts.iter())
    }
}
