//! Interactive routing
//!
//! [`ConnectionController`] turns pointer and keyboard events into routing
//! transactions. A route starts on the first tap, grows one waypoint per
//! tap, and ends on commit, on a tap that lands on existing geometry, or is
//! thrown away on escape. Every waypoint remembers the engine checkpoint
//! taken before it was placed, so backspace and escape are exact rollbacks.
//!
//! A transaction applied to the engine from outside the controller closes
//! the route, keeping what was drawn. The controller notices on its next
//! event, finishes the route and handles the event from `Idle`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{Checkpoint, Resolution, TransactionEngine};
use crate::geometry::Point;
use crate::graph::{EdgeId, EdgeStyle, LayerId, VertexId};
use crate::rules::OwnershipConflict;
use crate::transaction::{split_point, ExtendRoute, InsertVertex, RouteTarget, SplitEdge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    #[default]
    Idle,
    StartingRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
}

/// What the event source knows besides the pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub layer: LayerId,
    pub width: f64,
    pub modifiers: Modifiers,
}

impl Default for EventContext {
    fn default() -> Self {
        let style = EdgeStyle::default();
        Self {
            layer: style.layer,
            width: style.width,
            modifiers: Modifiers::default(),
        }
    }
}

impl EventContext {
    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    fn style(&self) -> EdgeStyle {
        EdgeStyle {
            width: self.width,
            layer: self.layer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteEvent {
    Tap { point: Point, context: EventContext },
    Move { point: Point, context: EventContext },
    Backspace,
    Escape,
    Commit,
}

impl RouteEvent {
    pub fn tap(x: f64, y: f64) -> Self {
        RouteEvent::Tap {
            point: Point::new(x, y),
            context: EventContext::default(),
        }
    }

    pub fn move_to(x: f64, y: f64) -> Self {
        RouteEvent::Move {
            point: Point::new(x, y),
            context: EventContext::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RouteEvent::Tap { .. } => "tap",
            RouteEvent::Move { .. } => "move",
            RouteEvent::Backspace => "backspace",
            RouteEvent::Escape => "escape",
            RouteEvent::Commit => "commit",
        }
    }
}

/// Result of one event, for the caller's redraw.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerOutput {
    pub changed: BTreeSet<VertexId>,
    /// Last edge of a route that was just completed.
    pub committed: Option<EdgeId>,
    /// Rubber-band polyline for `Move`.
    pub preview: Option<Vec<Point>>,
    pub conflicts: Vec<OwnershipConflict>,
}

impl ControllerOutput {
    fn from_resolution(resolution: Resolution) -> Self {
        Self {
            changed: resolution.changed,
            conflicts: resolution.conflicts,
            ..Self::default()
        }
    }

    fn absorb(&mut self, resolution: Resolution) {
        self.changed.extend(resolution.changed);
        for conflict in resolution.conflicts {
            if !self.conflicts.contains(&conflict) {
                self.conflicts.push(conflict);
            }
        }
    }
}

/// A placed route point and how to get back to before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub vertex: VertexId,
    /// Edge that reached this waypoint; none for the first.
    pub edge: Option<EdgeId>,
    checkpoint: Checkpoint,
}

enum Hit {
    Vertex(VertexId),
    Edge(EdgeId, Point),
    Empty,
}

#[derive(Debug, Default)]
pub struct ConnectionController {
    state: RouteState,
    waypoints: Vec<Waypoint>,
    generation: u64,
}

impl ConnectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn last_waypoint(&self) -> Option<VertexId> {
        self.waypoints.last().map(|w| w.vertex)
    }

    pub fn handle(&mut self, engine: &mut TransactionEngine, event: RouteEvent) -> ControllerOutput {
        debug!(event = event.name(), state = ?self.state, "route event");
        let interrupted = if self.state == RouteState::StartingRoute
            && !engine.is_route_open(self.generation)
        {
            debug!("route was closed by an external transaction");
            Some(self.finish(engine))
        } else {
            None
        };

        let mut output = match (self.state, event) {
            (RouteState::Idle, RouteEvent::Tap { point, context }) => {
                self.start_route(engine, point, context)
            }
            (RouteState::StartingRoute, RouteEvent::Tap { point, context }) => {
                self.extend_route(engine, point, context)
            }
            (_, RouteEvent::Move { point, .. }) => ControllerOutput {
                preview: self.preview(engine, point),
                ..ControllerOutput::default()
            },
            (RouteState::StartingRoute, RouteEvent::Backspace) => self.backspace(engine),
            (RouteState::StartingRoute, RouteEvent::Escape) => self.cancel(engine),
            (RouteState::StartingRoute, RouteEvent::Commit) => self.commit(engine),
            (RouteState::Idle, _) => ControllerOutput::default(),
        };
        if let Some((resolution, committed)) = interrupted {
            output.absorb(resolution);
            output.committed = output.committed.or(committed);
        }
        output
    }

    /// Follows merges reported by the route's own transactions.
    fn remap_waypoints(&mut self, merged: &BTreeMap<VertexId, VertexId>) {
        for waypoint in &mut self.waypoints {
            let mut current = waypoint.vertex;
            for _ in 0..=merged.len() {
                match merged.get(&current) {
                    Some(next) => current = *next,
                    None => break,
                }
            }
            waypoint.vertex = current;
        }
    }

    /// Where a tap or hover at `point` would end a segment, and the point
    /// that segment ends at.
    fn target_at(engine: &TransactionEngine, point: Point) -> Option<(RouteTarget, Point)> {
        Some(match Self::hit_test(engine, point) {
            Hit::Vertex(id) => (RouteTarget::Vertex(id), engine.graph().vertex(id)?.point),
            Hit::Edge(edge, at) => {
                let e = engine.graph().edge(edge)?;
                let a = engine.graph().vertex(e.start)?.point;
                let b = engine.graph().vertex(e.end)?.point;
                let on = split_point(a, b, at, engine.policy(), engine.policy().epsilon());
                (RouteTarget::OnEdge { edge, at }, on)
            }
            Hit::Empty => (RouteTarget::Point(point), engine.policy().snap(point)),
        })
    }

    /// Vertices win over edges; the raw point is tried before the snapped one.
    fn hit_test(engine: &TransactionEngine, point: Point) -> Hit {
        let policy = engine.policy();
        let radius = policy.epsilon();
        let candidates = [point, policy.snap(point)];
        let graph = engine.graph();
        if let Some(v) = candidates.iter().find_map(|p| graph.vertex_near(*p, radius)) {
            return Hit::Vertex(v);
        }
        if let Some((e, at)) = candidates.iter().find_map(|p| graph.edge_near(*p, radius)) {
            return Hit::Edge(e, at);
        }
        Hit::Empty
    }

    fn start_route(
        &mut self,
        engine: &mut TransactionEngine,
        point: Point,
        _context: EventContext,
    ) -> ControllerOutput {
        if !point.is_finite() {
            return ControllerOutput::default();
        }
        self.generation = engine.open_route();
        let checkpoint = engine.checkpoint();
        let resolution = match Self::hit_test(engine, point) {
            Hit::Vertex(id) => Resolution {
                vertex: Some(id),
                ..Resolution::default()
            },
            Hit::Edge(edge, at) => engine.apply_in_route(&SplitEdge { edge, at }),
            Hit::Empty => engine.apply_in_route(&InsertVertex::free(point)),
        };

        let Some(vertex) = resolution.vertex else {
            engine.rollback(checkpoint);
            engine.close_route();
            return ControllerOutput::default();
        };
        engine.guard(vertex);
        self.waypoints.push(Waypoint {
            vertex,
            edge: None,
            checkpoint,
        });
        self.state = RouteState::StartingRoute;
        debug!(%vertex, "route started");
        ControllerOutput::from_resolution(resolution)
    }

    fn extend_route(
        &mut self,
        engine: &mut TransactionEngine,
        point: Point,
        context: EventContext,
    ) -> ControllerOutput {
        let Some(mut last) = self.waypoints.last().copied() else {
            self.state = RouteState::Idle;
            return ControllerOutput::default();
        };
        last.vertex = engine.follow(last.vertex);
        let Some(from) = engine.graph().vertex(last.vertex).map(|v| v.point) else {
            return self.cancel(engine);
        };
        if !point.is_finite() {
            return ControllerOutput::default();
        }

        let Some((target, to)) = Self::target_at(engine, point) else {
            return ControllerOutput::default();
        };
        if target == RouteTarget::Vertex(last.vertex) {
            return self.commit(engine);
        }
        let terminates = !matches!(target, RouteTarget::Point(_)) && !context.modifiers.shift;
        let corner = engine.policy().elbow(from, to);

        let checkpoint = engine.checkpoint();
        let step = ExtendRoute::new(last.vertex, target)
            .with_corner(corner)
            .with_style(context.style());
        let resolution = engine.apply_in_route(&step);

        let Some(vertex) = resolution.vertex else {
            engine.rollback(checkpoint);
            return ControllerOutput::default();
        };
        self.remap_waypoints(&resolution.merged);
        let previous = engine.follow(last.vertex);
        engine.unguard(previous);
        engine.guard(vertex);
        self.waypoints.push(Waypoint {
            vertex,
            edge: resolution.edge,
            checkpoint,
        });

        if terminates {
            debug!(%vertex, "route reached existing geometry");
            let mut output = ControllerOutput::from_resolution(resolution);
            let (finish, committed) = self.finish(engine);
            output.absorb(finish);
            output.committed = committed;
            output
        } else {
            ControllerOutput::from_resolution(resolution)
        }
    }

    fn backspace(&mut self, engine: &mut TransactionEngine) -> ControllerOutput {
        let Some(popped) = self.waypoints.pop() else {
            self.state = RouteState::Idle;
            return ControllerOutput::default();
        };
        let resolution = engine.rollback(popped.checkpoint);
        engine.clear_guards();
        match self.waypoints.last() {
            Some(last) => {
                engine.guard(last.vertex);
                debug!(remaining = self.waypoints.len(), "waypoint removed");
            }
            None => {
                engine.close_route();
                self.state = RouteState::Idle;
                debug!("route emptied by backspace");
            }
        }
        ControllerOutput::from_resolution(resolution)
    }

    fn cancel(&mut self, engine: &mut TransactionEngine) -> ControllerOutput {
        let resolution = match self.waypoints.first() {
            Some(first) => engine.rollback(first.checkpoint),
            None => Resolution::default(),
        };
        engine.close_route();
        self.waypoints.clear();
        self.state = RouteState::Idle;
        debug!(changed = resolution.changed.len(), "route cancelled");
        ControllerOutput::from_resolution(resolution)
    }

    fn commit(&mut self, engine: &mut TransactionEngine) -> ControllerOutput {
        if self.waypoints.len() < 2 {
            return self.cancel(engine);
        }
        let (resolution, committed) = self.finish(engine);
        let mut output = ControllerOutput::from_resolution(resolution);
        output.committed = committed;
        output
    }

    /// Keeps the route, drops checkpoints and guards, and lets the rules
    /// clean up around the waypoints.
    fn finish(&mut self, engine: &mut TransactionEngine) -> (Resolution, Option<EdgeId>) {
        let last_edge = self.waypoints.last().and_then(|w| w.edge);
        let anchors: BTreeSet<VertexId> = self
            .waypoints
            .iter()
            .map(|w| engine.follow(w.vertex))
            .filter(|v| engine.graph().contains_vertex(*v))
            .collect();
        if engine.is_route_open(self.generation) {
            engine.close_route();
        }
        self.waypoints.clear();
        self.state = RouteState::Idle;

        let resolution = engine.resolve(anchors);
        let committed = last_edge
            .map(|e| resolution.replaced_edges.get(&e).copied().unwrap_or(e))
            .filter(|e| engine.graph().contains_edge(*e));
        debug!(committed = ?committed, "route committed");
        (resolution, committed)
    }

    fn preview(&self, engine: &TransactionEngine, point: Point) -> Option<Vec<Point>> {
        if self.state != RouteState::StartingRoute || !point.is_finite() {
            return None;
        }
        let from = engine
            .graph()
            .vertex(engine.follow(self.last_waypoint()?))?
            .point;
        let (_, to) = Self::target_at(engine, point)?;
        let mut line = vec![from];
        line.extend(engine.policy().elbow(from, to));
        line.push(to);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FreePolicy, ManhattanGrid};
    use crate::graph::{OwnerId, Ownership};
    use crate::transaction::{InsertEdge, InsertVertex};

    fn grid_engine() -> TransactionEngine {
        TransactionEngine::new(Box::new(ManhattanGrid::new(10.0).unwrap()))
    }

    #[test]
    fn test_tap_tap_escape() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();

        let out = ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        assert_eq!(ctl.state(), RouteState::StartingRoute);
        assert_eq!(out.committed, None);
        assert_eq!(engine.graph().vertex_count(), 1);
        assert_eq!(engine.graph().edge_count(), 0);

        ctl.handle(&mut engine, RouteEvent::tap(10.0, 0.0));
        assert_eq!(ctl.state(), RouteState::StartingRoute);
        assert_eq!(engine.graph().vertex_count(), 2);
        assert_eq!(engine.graph().edge_count(), 1);

        ctl.handle(&mut engine, RouteEvent::Escape);
        assert_eq!(ctl.state(), RouteState::Idle);
        assert!(engine.graph().is_empty());
        assert!(engine.guarded().is_empty());
    }

    #[test]
    fn test_idle_keys_are_noops() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        for event in [RouteEvent::Backspace, RouteEvent::Escape, RouteEvent::Commit] {
            let out = ctl.handle(&mut engine, event);
            assert_eq!(out, ControllerOutput::default());
            assert_eq!(ctl.state(), RouteState::Idle);
        }
        assert_eq!(engine.applied_count(), 0);
    }

    #[test]
    fn test_backspace_steps_back() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(20.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(20.0, 30.0));
        assert_eq!(engine.graph().edge_count(), 2);

        ctl.handle(&mut engine, RouteEvent::Backspace);
        assert_eq!(ctl.state(), RouteState::StartingRoute);
        assert_eq!(engine.graph().edge_count(), 1);
        assert_eq!(ctl.waypoints().len(), 2);

        ctl.handle(&mut engine, RouteEvent::Backspace);
        assert_eq!(engine.graph().vertex_count(), 1);
        ctl.handle(&mut engine, RouteEvent::Backspace);
        assert_eq!(ctl.state(), RouteState::Idle);
        assert!(engine.graph().is_empty());
    }

    #[test]
    fn test_commit_keeps_route_and_merges_straight_runs() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(10.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(20.0, 0.0));
        assert_eq!(engine.graph().vertex_count(), 3);

        let out = ctl.handle(&mut engine, RouteEvent::Commit);
        assert_eq!(ctl.state(), RouteState::Idle);
        assert_eq!(engine.graph().vertex_count(), 2);
        assert_eq!(engine.graph().edge_count(), 1);
        let committed = out.committed.unwrap();
        assert!(engine.graph().contains_edge(committed));
        assert!(!engine.has_checkpoints());
    }

    #[test]
    fn test_single_waypoint_commit_is_discarded() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(30.0, 30.0));
        let out = ctl.handle(&mut engine, RouteEvent::Commit);
        assert_eq!(out.committed, None);
        assert!(engine.graph().is_empty());
    }

    #[test]
    fn test_tap_on_last_waypoint_commits() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 40.0));
        let out = ctl.handle(&mut engine, RouteEvent::tap(0.0, 40.0));
        assert_eq!(ctl.state(), RouteState::Idle);
        assert!(out.committed.is_some());
        assert_eq!(engine.graph().edge_count(), 1);
    }

    #[test]
    fn test_auto_terminate_on_pin() {
        let mut engine = grid_engine();
        let pin = engine
            .apply(&InsertVertex::pin(Point::new(50.0, 0.0), OwnerId::new(), "A1"))
            .vertex
            .unwrap();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let out = ctl.handle(&mut engine, RouteEvent::tap(50.0, 0.0));
        assert_eq!(ctl.state(), RouteState::Idle);
        let edge = out.committed.unwrap();
        assert!(engine.graph().edge(edge).unwrap().touches(pin));
    }

    #[test]
    fn test_shift_keeps_routing_through_existing_vertex() {
        let mut engine = grid_engine();
        let pin = engine
            .apply(&InsertVertex::pin(Point::new(50.0, 0.0), OwnerId::new(), "A1"))
            .vertex
            .unwrap();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let out = ctl.handle(
            &mut engine,
            RouteEvent::Tap {
                point: Point::new(50.0, 0.0),
                context: EventContext::default().with_shift(),
            },
        );
        assert_eq!(ctl.state(), RouteState::StartingRoute);
        assert_eq!(out.committed, None);
        assert_eq!(ctl.last_waypoint(), Some(pin));
    }

    #[test]
    fn test_first_tap_on_edge_splits_it() {
        let mut engine = grid_engine();
        let a = engine.apply(&InsertVertex::free(Point::new(0.0, 0.0))).vertex.unwrap();
        let b = engine.apply(&InsertVertex::free(Point::new(40.0, 0.0))).vertex.unwrap();
        engine.apply(&InsertEdge::new(a, b));

        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(20.0, 0.0));
        let junction = ctl.last_waypoint().unwrap();
        assert_eq!(engine.graph().degree(junction), 2);
        assert_eq!(engine.graph().edge_count(), 2);

        ctl.handle(&mut engine, RouteEvent::tap(20.0, 30.0));
        ctl.handle(&mut engine, RouteEvent::Commit);
        assert_eq!(engine.graph().degree(junction), 3);
        assert_eq!(engine.graph().edge_count(), 3);
    }

    #[test]
    fn test_elbow_on_grid() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let preview = ctl
            .handle(&mut engine, RouteEvent::move_to(31.0, 19.0))
            .preview
            .unwrap();
        assert_eq!(
            preview,
            vec![Point::ORIGIN, Point::new(30.0, 0.0), Point::new(30.0, 20.0)]
        );
        assert_eq!(engine.graph().vertex_count(), 1);

        ctl.handle(&mut engine, RouteEvent::tap(31.0, 19.0));
        assert_eq!(engine.graph().edge_count(), 2);
        assert!(engine.graph().vertex_near(Point::new(30.0, 0.0), 0.1).is_some());
        assert!(engine
            .graph()
            .edges()
            .all(|e| {
                let a = engine.graph().vertex(e.start).unwrap().point;
                let b = engine.graph().vertex(e.end).unwrap().point;
                a.x == b.x || a.y == b.y
            }));
    }

    fn all_axis_aligned(engine: &TransactionEngine) -> bool {
        let graph = engine.graph();
        graph.edges().all(|e| {
            let a = graph.vertex(e.start).unwrap().point;
            let b = graph.vertex(e.end).unwrap().point;
            engine.policy().is_horizontal(a, b) || engine.policy().is_vertical(a, b)
        })
    }

    fn off_grid_pin(engine: &mut TransactionEngine) -> VertexId {
        engine
            .apply(&InsertVertex::pin(Point::new(12.0, 7.0), OwnerId::new(), "3"))
            .vertex
            .unwrap()
    }

    #[test]
    fn test_route_to_off_grid_pin_stays_on_axis() {
        let mut engine = grid_engine();
        let pin = off_grid_pin(&mut engine);
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let out = ctl.handle(&mut engine, RouteEvent::tap(12.0, 7.0));

        assert_eq!(ctl.state(), RouteState::Idle);
        assert!(engine.graph().edge(out.committed.unwrap()).unwrap().touches(pin));
        assert_eq!(engine.graph().edge_count(), 2);
        assert!(engine.graph().vertex_near(Point::new(12.0, 0.0), 1e-9).is_some());
        assert!(all_axis_aligned(&engine));
    }

    #[test]
    fn test_route_from_off_grid_pin_matches_preview() {
        let mut engine = grid_engine();
        let pin = off_grid_pin(&mut engine);
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(12.0, 7.0));
        assert_eq!(ctl.last_waypoint(), Some(pin));

        let preview = ctl
            .handle(&mut engine, RouteEvent::move_to(31.0, 19.0))
            .preview
            .unwrap();
        assert_eq!(
            preview,
            vec![Point::new(12.0, 7.0), Point::new(30.0, 7.0), Point::new(30.0, 20.0)]
        );

        ctl.handle(&mut engine, RouteEvent::tap(31.0, 19.0));
        ctl.handle(&mut engine, RouteEvent::Commit);
        for point in preview {
            assert!(engine.graph().vertex_near(point, 1e-9).is_some(), "{point}");
        }
        assert_eq!(engine.graph().edge_count(), 2);
        assert!(all_axis_aligned(&engine));
    }

    #[test]
    fn test_external_transaction_is_not_rolled_back() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let pin = off_grid_pin(&mut engine);
        let out = ctl.handle(&mut engine, RouteEvent::Commit);

        assert_eq!(ctl.state(), RouteState::Idle);
        assert_eq!(out.committed, None);
        assert!(engine.graph().contains_vertex(pin));
        assert!(!engine.has_checkpoints());
    }

    #[test]
    fn test_external_transaction_keeps_route_drawn_so_far() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 30.0));

        // A pin dropped onto the last waypoint absorbs it
        let pin = engine
            .apply(&InsertVertex::pin(Point::new(0.0, 30.0), OwnerId::new(), "1"))
            .vertex
            .unwrap();
        assert!(engine.guarded().is_empty());

        let out = ctl.handle(&mut engine, RouteEvent::Escape);
        assert_eq!(ctl.state(), RouteState::Idle);
        assert!(out.committed.is_some());
        assert!(engine.graph().contains_vertex(pin));
        assert_eq!(engine.graph().edge_count(), 1);
        assert!(engine.graph().edges().next().unwrap().touches(pin));
    }

    #[test]
    fn test_tap_after_external_transaction_starts_new_route() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(40.0, 0.0));
        off_grid_pin(&mut engine);

        ctl.handle(&mut engine, RouteEvent::tap(40.0, 30.0));
        assert_eq!(ctl.state(), RouteState::StartingRoute);
        assert_eq!(ctl.waypoints().len(), 1);
        ctl.handle(&mut engine, RouteEvent::Escape);
        assert_eq!(engine.graph().edge_count(), 1);
        assert_eq!(engine.graph().vertex_count(), 3);
    }

    #[test]
    fn test_free_policy_has_no_elbow() {
        let mut engine = TransactionEngine::new(Box::new(FreePolicy::new()));
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        ctl.handle(&mut engine, RouteEvent::tap(3.0, 4.0));
        assert_eq!(engine.graph().edge_count(), 1);
        assert!(engine.graph().vertex_near(Point::new(3.0, 4.0), 1e-9).is_some());
    }

    #[test]
    fn test_waypoint_survives_cull_while_routing() {
        let mut engine = grid_engine();
        let mut ctl = ConnectionController::new();
        ctl.handle(&mut engine, RouteEvent::tap(0.0, 0.0));
        let first = ctl.last_waypoint().unwrap();
        engine.resolve([first].into_iter().collect());
        assert!(engine.graph().contains_vertex(first));
        assert_eq!(engine.graph().vertex(first).unwrap().ownership, Ownership::Free);
    }
}
