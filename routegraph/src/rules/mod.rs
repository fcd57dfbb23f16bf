//! Normalisation rules
//!
//! After every transaction the engine re-normalises the neighbourhood the
//! transaction touched by running a fixed, ordered list of rules until the
//! graph stops changing. Each rule is idempotent and only looks at the
//! region held by the [`ResolutionContext`].

pub mod coincident;
pub mod collinear;
pub mod cull;
pub mod duplicate;
pub mod snap;

pub use coincident::CoincidentMergeRule;
pub use collinear::CollinearMergeRule;
pub use cull::IsolatedCullRule;
pub use duplicate::DuplicateEdgeRule;
pub use snap::GridSnapRule;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::geometry::{GeometryPolicy, Point};
use crate::graph::{EdgeId, GraphState, Vertex, VertexId};

/// Application hook that may veto removing an isolated free vertex
/// (for example one anchoring a net label).
pub trait CullPolicy {
    fn can_cull_isolated(&self, vertex: &Vertex, state: &GraphState) -> bool;
}

impl<F> CullPolicy for F
where
    F: Fn(&Vertex, &GraphState) -> bool,
{
    fn can_cull_isolated(&self, vertex: &Vertex, state: &GraphState) -> bool {
        self(vertex, state)
    }
}

/// Two vertices that coincide but both carry non-free ownership of equal
/// precedence. They are left in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipConflict {
    pub first: VertexId,
    pub second: VertexId,
    pub at: Point,
}

/// Scope and bookkeeping of one resolution run.
pub struct ResolutionContext<'a> {
    epicenter: BTreeSet<VertexId>,
    region: BTreeSet<VertexId>,
    policy: &'a dyn GeometryPolicy,
    padding: f64,
    cull_policy: Option<&'a dyn CullPolicy>,
    guarded: BTreeSet<VertexId>,
    changed: BTreeSet<VertexId>,
    merged: BTreeMap<VertexId, VertexId>,
    replaced_edges: BTreeMap<EdgeId, EdgeId>,
    conflicts: Vec<OwnershipConflict>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(epicenter: BTreeSet<VertexId>, policy: &'a dyn GeometryPolicy) -> Self {
        Self {
            epicenter,
            region: BTreeSet::new(),
            policy,
            padding: 0.0,
            cull_policy: None,
            guarded: BTreeSet::new(),
            changed: BTreeSet::new(),
            merged: BTreeMap::new(),
            replaced_edges: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Extra radius around epicenter vertices pulled into the region.
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = if padding.is_finite() { padding.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_cull_policy(mut self, cull_policy: Option<&'a dyn CullPolicy>) -> Self {
        self.cull_policy = cull_policy;
        self
    }

    /// Vertices no rule may remove during this run.
    pub fn with_guarded(mut self, guarded: BTreeSet<VertexId>) -> Self {
        self.guarded = guarded;
        self
    }

    pub fn policy(&self) -> &'a dyn GeometryPolicy {
        self.policy
    }

    pub fn epicenter(&self) -> &BTreeSet<VertexId> {
        &self.epicenter
    }

    pub fn region(&self) -> &BTreeSet<VertexId> {
        &self.region
    }

    /// Region as an owned list, for rules that mutate while iterating.
    pub fn region_ids(&self) -> Vec<VertexId> {
        self.region.iter().copied().collect()
    }

    /// Recomputes the region: epicenter and everything changed so far,
    /// their neighbours, and vertices within the padding radius.
    pub fn expand(&mut self, state: &GraphState) {
        let seeds: BTreeSet<VertexId> = self
            .epicenter
            .iter()
            .chain(self.changed.iter())
            .chain(self.region.iter())
            .copied()
            .filter(|id| state.contains_vertex(*id))
            .collect();

        let mut region = seeds.clone();
        for id in &seeds {
            region.extend(state.neighbors(*id));
            if self.padding > 0.0 {
                if let Some(vertex) = state.vertex(*id) {
                    region.extend(state.vertices_within(vertex.point, self.padding));
                }
            }
        }
        self.region = region;
    }

    /// Pulls a vertex into the current region.
    pub fn include(&mut self, id: VertexId) {
        self.region.insert(id);
    }

    pub fn mark_changed(&mut self, id: VertexId) {
        self.changed.insert(id);
    }

    pub fn is_guarded(&self, id: VertexId) -> bool {
        self.guarded.contains(&id)
    }

    /// Whether the cull rule may remove this isolated vertex.
    pub fn can_cull(&self, vertex: &Vertex, state: &GraphState) -> bool {
        if self.is_guarded(vertex.id) {
            return false;
        }
        self.cull_policy
            .map_or(true, |policy| policy.can_cull_isolated(vertex, state))
    }

    pub fn record_merge(&mut self, loser: VertexId, survivor: VertexId) {
        for target in self.merged.values_mut() {
            if *target == loser {
                *target = survivor;
            }
        }
        self.merged.insert(loser, survivor);
        if self.guarded.remove(&loser) {
            self.guarded.insert(survivor);
        }
    }

    pub fn record_edge_replacement(&mut self, old: EdgeId, new: EdgeId) {
        for target in self.replaced_edges.values_mut() {
            if *target == old {
                *target = new;
            }
        }
        self.replaced_edges.insert(old, new);
    }

    /// Records a conflict once per vertex pair.
    pub fn record_conflict(&mut self, a: VertexId, b: VertexId, at: Point) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        if self
            .conflicts
            .iter()
            .any(|c| c.first == first && c.second == second)
        {
            return;
        }
        warn!(%first, %second, %at, "coincident vertices with conflicting ownership left unmerged");
        self.conflicts.push(OwnershipConflict { first, second, at });
    }

    pub fn changed(&self) -> &BTreeSet<VertexId> {
        &self.changed
    }

    pub fn merged(&self) -> &BTreeMap<VertexId, VertexId> {
        &self.merged
    }

    pub fn replaced_edges(&self) -> &BTreeMap<EdgeId, EdgeId> {
        &self.replaced_edges
    }

    pub fn conflicts(&self) -> &[OwnershipConflict] {
        &self.conflicts
    }

    /// Where a vertex ended up after merges in this run.
    pub fn resolve_vertex(&self, id: VertexId) -> VertexId {
        self.merged.get(&id).copied().unwrap_or(id)
    }

    /// Which edge replaced `id` in this run, if any.
    pub fn resolve_edge(&self, id: EdgeId) -> EdgeId {
        self.replaced_edges.get(&id).copied().unwrap_or(id)
    }

    pub(crate) fn into_parts(self) -> ResolutionParts {
        ResolutionParts {
            changed: self.changed,
            merged: self.merged,
            replaced_edges: self.replaced_edges,
            conflicts: self.conflicts,
        }
    }
}

/// Accumulated bookkeeping handed back to the engine.
pub(crate) struct ResolutionParts {
    pub changed: BTreeSet<VertexId>,
    pub merged: BTreeMap<VertexId, VertexId>,
    pub replaced_edges: BTreeMap<EdgeId, EdgeId>,
    pub conflicts: Vec<OwnershipConflict>,
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn apply(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>);
}

/// Ordered rule pipeline.
pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Snap, merge coincident vertices, drop duplicate edges, merge
    /// collinear segments, cull isolated vertices.
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(GridSnapRule));
        engine.add_rule(Arc::new(CoincidentMergeRule));
        engine.add_rule(Arc::new(DuplicateEdgeRule));
        engine.add_rule(Arc::new(CollinearMergeRule));
        engine.add_rule(Arc::new(IsolatedCullRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule once over the current region.
    pub fn run_pass(&self, state: &mut GraphState, ctx: &mut ResolutionContext<'_>) {
        ctx.expand(state);
        for rule in &self.rules {
            rule.apply(state, ctx);
        }
    }

    /// Runs passes until one leaves the graph unchanged or `max_passes` is
    /// reached. Returns the number of passes run.
    pub fn resolve(
        &self,
        state: &mut GraphState,
        ctx: &mut ResolutionContext<'_>,
        max_passes: usize,
    ) -> usize {
        let mut passes = 0;
        while passes < max_passes {
            let before = state.revision();
            self.run_pass(state, ctx);
            passes += 1;
            if state.revision() == before {
                debug!(passes, region = ctx.region().len(), "resolution reached a fixed point");
                return passes;
            }
        }
        if max_passes > 0 {
            warn!(max_passes, "resolution stopped at the pass limit before a fixed point");
        }
        passes
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}
