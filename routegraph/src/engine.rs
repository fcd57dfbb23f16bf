//! Transaction engine
//!
//! Owns the live [`GraphState`] and is the only way transactions reach it.
//! Each call applies one transaction, resolves the padded epicenter through
//! the rule pipeline until nothing changes, and reports which vertices
//! changed. Checkpoints backed by the graph journal let callers roll back a
//! run of transactions exactly.
//!
//! While the connection controller has a route open, its checkpoints cover
//! only its own transactions: any other [`TransactionEngine::apply`] first
//! closes the route, keeping what was drawn so far.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::{EngineOptions, RouteGraphError};
use crate::geometry::GeometryPolicy;
use crate::graph::{EdgeId, GraphState, JournalMark, VertexId};
use crate::rules::{CullPolicy, OwnershipConflict, ResolutionContext, RulesEngine};
use crate::transaction::{Epicenter, Transaction, TransactionContext};

/// Outcome of one engine call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    /// Every vertex created, moved, re-owned, merged or removed.
    pub changed: BTreeSet<VertexId>,
    /// Coincident merges, loser to survivor.
    pub merged: BTreeMap<VertexId, VertexId>,
    /// Edges replaced by a merge, old to new.
    pub replaced_edges: BTreeMap<EdgeId, EdgeId>,
    pub conflicts: Vec<OwnershipConflict>,
    pub passes: usize,
    /// The transaction's primary vertex after merges, if it still exists.
    pub vertex: Option<VertexId>,
    /// The transaction's primary edge after replacements, if it still exists.
    pub edge: Option<EdgeId>,
}

impl Resolution {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.vertex.is_none() && self.edge.is_none()
    }

    pub fn resolve_vertex(&self, id: VertexId) -> VertexId {
        self.merged.get(&id).copied().unwrap_or(id)
    }
}

/// Entry of the engine's bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub changed: usize,
    pub passes: usize,
}

/// Opaque rollback point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    mark: JournalMark,
}

pub struct TransactionEngine {
    graph: GraphState,
    policy: Box<dyn GeometryPolicy>,
    rules: RulesEngine,
    options: EngineOptions,
    cull_policy: Option<Box<dyn CullPolicy>>,
    guarded: BTreeSet<VertexId>,
    history: VecDeque<TransactionRecord>,
    applied: usize,
    route_open: bool,
    route_generation: u64,
    /// Merges seen since the current route opened, loser to survivor.
    route_merges: BTreeMap<VertexId, VertexId>,
}

impl TransactionEngine {
    /// Engine over an empty graph with default options and rules.
    pub fn new(policy: Box<dyn GeometryPolicy>) -> Self {
        let options = EngineOptions::default();
        Self::assemble(GraphState::with_cell_size(options.spatial_cell), policy, options)
    }

    pub fn with_options(
        policy: Box<dyn GeometryPolicy>,
        options: EngineOptions,
    ) -> Result<Self, RouteGraphError> {
        options.validate()?;
        let graph = GraphState::with_cell_size(options.spatial_cell);
        Ok(Self::assemble(graph, policy, options))
    }

    /// Engine over an already loaded graph.
    pub fn with_graph(
        graph: GraphState,
        policy: Box<dyn GeometryPolicy>,
        options: EngineOptions,
    ) -> Result<Self, RouteGraphError> {
        options.validate()?;
        graph.check_integrity()?;
        Ok(Self::assemble(graph, policy, options))
    }

    fn assemble(graph: GraphState, policy: Box<dyn GeometryPolicy>, options: EngineOptions) -> Self {
        Self {
            graph,
            policy,
            rules: RulesEngine::with_default_rules(),
            options,
            cull_policy: None,
            guarded: BTreeSet::new(),
            history: VecDeque::new(),
            applied: 0,
            route_open: false,
            route_generation: 0,
            route_merges: BTreeMap::new(),
        }
    }

    /// Replaces the rule pipeline.
    pub fn with_rules(mut self, rules: RulesEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cull_policy(mut self, policy: impl CullPolicy + 'static) -> Self {
        self.cull_policy = Some(Box::new(policy));
        self
    }

    pub fn set_cull_policy(&mut self, policy: Option<Box<dyn CullPolicy>>) {
        self.cull_policy = policy;
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    pub fn policy(&self) -> &dyn GeometryPolicy {
        self.policy.as_ref()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn history(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.history.iter()
    }

    /// Transactions applied over the engine's lifetime.
    pub fn applied_count(&self) -> usize {
        self.applied
    }

    /// Applies a transaction and resolves its neighbourhood. Completes
    /// before returning; the graph is consistent afterwards.
    ///
    /// An open controller route is closed first, so a later escape or
    /// backspace cannot undo this transaction.
    pub fn apply(&mut self, transaction: &dyn Transaction) -> Resolution {
        if self.route_open {
            debug!(
                transaction = transaction.name(),
                "external transaction closes the open route"
            );
            self.close_route();
        }
        self.apply_in_route(transaction)
    }

    /// `apply` for the route's own steps.
    pub(crate) fn apply_in_route(&mut self, transaction: &dyn Transaction) -> Resolution {
        let ctx = TransactionContext::new(self.policy.as_ref());
        let epicenter = transaction.apply(&mut self.graph, &ctx);
        debug!(
            transaction = transaction.name(),
            touched = epicenter.touched.len(),
            metadata_only = transaction.is_metadata_only(),
            "transaction applied"
        );

        let resolution = if transaction.is_metadata_only() || epicenter.touched.is_empty() {
            Resolution {
                vertex: epicenter.vertex.filter(|v| self.graph.contains_vertex(*v)),
                edge: epicenter.edge.filter(|e| self.graph.contains_edge(*e)),
                changed: epicenter.touched,
                ..Resolution::default()
            }
        } else {
            self.resolve_epicenter(epicenter)
        };

        self.applied += 1;
        self.history.push_back(TransactionRecord {
            name: transaction.name().to_string(),
            applied_at: Utc::now(),
            changed: resolution.changed.len(),
            passes: resolution.passes,
        });
        while self.history.len() > self.options.history_limit {
            self.history.pop_front();
        }
        resolution
    }

    /// Re-normalises around `epicenter` without a transaction. An open
    /// route stays open and its guards apply.
    pub fn resolve(&mut self, epicenter: BTreeSet<VertexId>) -> Resolution {
        self.resolve_epicenter(Epicenter {
            touched: epicenter,
            ..Epicenter::default()
        })
    }

    fn resolve_epicenter(&mut self, epicenter: Epicenter) -> Resolution {
        let guarded: BTreeSet<VertexId> = self.guarded.union(&epicenter.hold).copied().collect();
        let mut ctx = ResolutionContext::new(epicenter.touched.clone(), self.policy.as_ref())
            .with_padding(self.options.padding)
            .with_cull_policy(self.cull_policy.as_deref())
            .with_guarded(guarded);
        let passes = self
            .rules
            .resolve(&mut self.graph, &mut ctx, self.options.max_passes);

        let vertex = epicenter
            .vertex
            .map(|v| ctx.resolve_vertex(v))
            .filter(|v| self.graph.contains_vertex(*v));
        let edge = epicenter
            .edge
            .map(|e| ctx.resolve_edge(e))
            .filter(|e| self.graph.contains_edge(*e));
        let parts = ctx.into_parts();

        for (loser, survivor) in &parts.merged {
            if self.guarded.remove(loser) {
                self.guarded.insert(*survivor);
            }
            self.route_merges.insert(*loser, *survivor);
        }

        let mut changed = epicenter.touched;
        changed.extend(parts.changed);
        Resolution {
            changed,
            merged: parts.merged,
            replaced_edges: parts.replaced_edges,
            conflicts: parts.conflicts,
            passes,
            vertex,
            edge,
        }
    }

    // ---------------------------------------------------------------------
    // Guards
    // ---------------------------------------------------------------------

    /// Protects a vertex from removal by rules until unguarded.
    pub fn guard(&mut self, id: VertexId) {
        self.guarded.insert(id);
    }

    pub fn unguard(&mut self, id: VertexId) {
        self.guarded.remove(&id);
    }

    pub fn clear_guards(&mut self) {
        self.guarded.clear();
    }

    pub fn guarded(&self) -> &BTreeSet<VertexId> {
        &self.guarded
    }

    // ---------------------------------------------------------------------
    // Route scope
    // ---------------------------------------------------------------------

    /// Marks the start of a controller route and returns its generation.
    pub(crate) fn open_route(&mut self) -> u64 {
        self.route_open = true;
        self.route_generation += 1;
        self.route_merges.clear();
        self.route_generation
    }

    /// Ends the route: keeps its edits, drops checkpoints and guards.
    pub(crate) fn close_route(&mut self) {
        self.route_open = false;
        self.release_checkpoints();
        self.clear_guards();
    }

    /// Whether the route of `generation` is still open.
    pub fn is_route_open(&self, generation: u64) -> bool {
        self.route_open && self.route_generation == generation
    }

    /// Current id of a vertex that may have been merged away since the
    /// route opened. Live ids map to themselves.
    pub fn follow(&self, id: VertexId) -> VertexId {
        let mut current = id;
        for _ in 0..=self.route_merges.len() {
            if self.graph.contains_vertex(current) {
                return current;
            }
            match self.route_merges.get(&current) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }

    // ---------------------------------------------------------------------
    // Checkpoints
    // ---------------------------------------------------------------------

    /// Starts (or continues) journalling and returns a rollback point.
    pub fn checkpoint(&mut self) -> Checkpoint {
        Checkpoint {
            mark: self.graph.mark(),
        }
    }

    /// Restores the graph to `checkpoint`. Checkpoints taken after it are
    /// invalidated. Returns the vertices the rollback touched.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> Resolution {
        let changed = self.graph.rollback_to(checkpoint.mark);
        debug!(
            position = checkpoint.mark.position(),
            changed = changed.len(),
            "rolled back to checkpoint"
        );
        Resolution {
            changed,
            ..Resolution::default()
        }
    }

    /// Keeps everything applied so far and drops all checkpoints.
    pub fn release_checkpoints(&mut self) {
        self.graph.close_journal();
    }

    pub fn has_checkpoints(&self) -> bool {
        self.graph.is_journaling()
    }
}
