//! Errors, options and the session facade shared by library users and the CLI.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::controller::{ConnectionController, ControllerOutput, RouteEvent, RouteState};
use crate::engine::TransactionEngine;
use crate::geometry::PolicyConfig;
use crate::graph::spatial::DEFAULT_CELL_SIZE;
use crate::graph::{EdgeId, GraphSnapshot, GraphState, VertexId};
use crate::rules::OwnershipConflict;
use crate::script::{EventScript, EventSummary, ReplayReport};

/// Boundary errors. Graph mutations themselves never fail; these come from
/// configuration, loading external data and integrity audits.
#[derive(Debug, thiserror::Error)]
pub enum RouteGraphError {
    #[error("Invalid geometry policy: {0}")]
    InvalidPolicy(String),
    #[error("Invalid graph snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Edge {edge} references missing vertex {vertex}")]
    DanglingEdge { edge: EdgeId, vertex: VertexId },
    #[error("Integrity violation: {0}")]
    Integrity(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tuning of the transaction engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Upper bound on rule pipeline passes per resolution.
    pub max_passes: usize,
    /// Radius around epicenter vertices pulled into the resolution region.
    pub padding: f64,
    /// Bucket size of the spatial index.
    pub spatial_cell: f64,
    /// Number of applied transactions kept in the engine's history.
    pub history_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_passes: 8,
            padding: 0.0,
            spatial_cell: DEFAULT_CELL_SIZE,
            history_limit: 256,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> Result<(), RouteGraphError> {
        if self.max_passes == 0 {
            return Err(RouteGraphError::InvalidOptions(
                "max_passes must be at least 1".to_string(),
            ));
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(RouteGraphError::InvalidOptions(format!(
                "padding must be a non-negative number, got {}",
                self.padding
            )));
        }
        if !self.spatial_cell.is_finite() || self.spatial_cell <= 0.0 {
            return Err(RouteGraphError::InvalidOptions(format!(
                "spatial_cell must be positive, got {}",
                self.spatial_cell
            )));
        }
        Ok(())
    }
}

/// An engine and a routing controller bound together, the way an editor
/// document drives them.
pub struct Session {
    engine: TransactionEngine,
    controller: ConnectionController,
}

impl Session {
    pub fn new(policy: &PolicyConfig, options: EngineOptions) -> Result<Self, RouteGraphError> {
        let engine = TransactionEngine::with_options(policy.build()?, options)?;
        Ok(Self {
            engine,
            controller: ConnectionController::new(),
        })
    }

    /// Session over an existing graph.
    pub fn with_graph(
        graph: GraphState,
        policy: &PolicyConfig,
        options: EngineOptions,
    ) -> Result<Self, RouteGraphError> {
        let engine = TransactionEngine::with_graph(graph, policy.build()?, options)?;
        Ok(Self {
            engine,
            controller: ConnectionController::new(),
        })
    }

    pub fn handle(&mut self, event: RouteEvent) -> ControllerOutput {
        self.controller.handle(&mut self.engine, event)
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransactionEngine {
        &mut self.engine
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    pub fn graph(&self) -> &GraphState {
        self.engine.graph()
    }

    pub fn route_state(&self) -> RouteState {
        self.controller.state()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.engine.graph().snapshot()
    }

    /// Builds a session from a script and feeds it every scripted event.
    pub fn replay(script: &EventScript) -> Result<ReplayReport, RouteGraphError> {
        let mut session = match &script.snapshot {
            Some(snapshot) => {
                let graph =
                    GraphState::from_snapshot_with_cell(snapshot.clone(), script.options.spatial_cell)?;
                Session::with_graph(graph, &script.policy, script.options.clone())?
            }
            None => Session::new(&script.policy, script.options.clone())?,
        };

        let started_at = chrono::Utc::now();
        let mut events = Vec::with_capacity(script.events.len());
        for (index, scripted) in script.events.iter().enumerate() {
            let output = session.handle(scripted.to_event());
            events.push(EventSummary::new(index, scripted, &output, session.route_state()));
        }

        Ok(ReplayReport {
            policy: script.policy.clone(),
            started_at,
            finished_at: chrono::Utc::now(),
            events,
            final_state: session.route_state(),
            transactions_applied: session.engine().applied_count(),
            islands: session.graph().islands().len(),
            graph: session.snapshot(),
        })
    }
}

/// Result of re-checking a graph: integrity already passed if this exists.
#[derive(Debug, Clone, Serialize)]
pub struct Audit {
    pub vertices: usize,
    pub edges: usize,
    pub islands: usize,
    /// Vertices a full resolution would still change.
    pub unstable_vertices: Vec<VertexId>,
    /// Edges a full resolution would add or remove.
    pub unstable_edges: Vec<EdgeId>,
    pub conflicts: Vec<OwnershipConflict>,
}

impl Audit {
    pub fn is_clean(&self) -> bool {
        self.unstable_vertices.is_empty() && self.unstable_edges.is_empty()
    }
}

/// Loads `snapshot`, checks referential integrity and runs the rule
/// pipeline over every vertex to see whether the graph is already stable.
pub fn audit(
    snapshot: &GraphSnapshot,
    policy: &PolicyConfig,
    options: &EngineOptions,
) -> Result<Audit, RouteGraphError> {
    let graph = GraphState::from_snapshot_with_cell(snapshot.clone(), options.spatial_cell)?;
    graph.check_integrity()?;
    let islands = graph.islands().len();
    let mut engine = TransactionEngine::with_graph(graph, policy.build()?, options.clone())?;
    let everything: BTreeSet<VertexId> = engine.graph().vertices().map(|v| v.id).collect();
    let resolution = engine.resolve(everything);
    let after = engine.graph().snapshot();

    let before_vertices: BTreeMap<VertexId, _> = snapshot.vertices.iter().map(|v| (v.id, v)).collect();
    let after_vertices: BTreeMap<VertexId, _> = after.vertices.iter().map(|v| (v.id, v)).collect();
    let unstable_vertices = before_vertices
        .keys()
        .chain(after_vertices.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|id| before_vertices.get(id) != after_vertices.get(id))
        .collect();

    let before_edges: BTreeMap<EdgeId, _> = snapshot.edges.iter().map(|e| (e.id, e)).collect();
    let after_edges: BTreeMap<EdgeId, _> = after.edges.iter().map(|e| (e.id, e)).collect();
    let unstable_edges = before_edges
        .keys()
        .chain(after_edges.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|id| before_edges.get(id) != after_edges.get(id))
        .collect();

    Ok(Audit {
        vertices: snapshot.vertices.len(),
        edges: snapshot.edges.len(),
        islands,
        unstable_vertices,
        unstable_edges,
        conflicts: resolution.conflicts,
    })
}
