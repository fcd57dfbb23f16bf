//! Integration tests for routing sessions and script replay

use routegraph::prelude::*;
use routegraph::{audit, EventScript, GeometryPolicy, GraphSnapshot, LayerId, OwnerId, VertexId};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn grid_session() -> Session {
    Session::new(&PolicyConfig::manhattan(10.0), EngineOptions::default()).unwrap()
}

#[test]
fn test_tap_tap_escape_scenario() {
    let mut session = grid_session();
    assert_eq!(session.route_state(), RouteState::Idle);

    let out = session.handle(RouteEvent::tap(0.0, 0.0));
    assert_eq!(session.route_state(), RouteState::StartingRoute);
    assert!(out.committed.is_none());
    assert_eq!(session.graph().vertex_count(), 1);
    assert_eq!(session.graph().edge_count(), 0);
    let first = session.graph().vertices().next().unwrap();
    assert_eq!(first.point, Point::new(0.0, 0.0));
    assert_eq!(first.ownership, Ownership::Free);

    session.handle(RouteEvent::tap(10.0, 0.0));
    assert_eq!(session.route_state(), RouteState::StartingRoute);
    assert_eq!(session.graph().vertex_count(), 2);
    assert_eq!(session.graph().edge_count(), 1);

    session.handle(RouteEvent::Escape);
    assert_eq!(session.route_state(), RouteState::Idle);
    assert!(session.graph().is_empty());
}

#[test]
fn test_escape_restores_existing_graph_exactly() {
    let mut session = grid_session();
    // Lay down a first wire and keep it
    session.handle(RouteEvent::tap(0.0, 0.0));
    session.handle(RouteEvent::tap(0.0, 50.0));
    session.handle(RouteEvent::Commit);
    let before = session.snapshot();

    // Start on the wire, wander off, cancel
    session.handle(RouteEvent::tap(0.0, 20.0));
    session.handle(RouteEvent::tap(30.0, 20.0));
    session.handle(RouteEvent::tap(30.0, 60.0));
    assert_ne!(session.snapshot(), before);

    session.handle(RouteEvent::Escape);
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.route_state(), RouteState::Idle);
}

#[test]
fn test_backspace_in_idle_is_noop() {
    let mut session = grid_session();
    session.handle(RouteEvent::tap(0.0, 0.0));
    session.handle(RouteEvent::tap(20.0, 0.0));
    session.handle(RouteEvent::Commit);
    let before = session.snapshot();
    let applied = session.engine().applied_count();

    let out = session.handle(RouteEvent::Backspace);
    assert!(out.changed.is_empty());
    assert_eq!(session.route_state(), RouteState::Idle);
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.engine().applied_count(), applied);
}

#[test]
fn test_backspace_then_continue() {
    let mut session = grid_session();
    session.handle(RouteEvent::tap(0.0, 0.0));
    session.handle(RouteEvent::tap(40.0, 0.0));
    session.handle(RouteEvent::Backspace);
    assert_eq!(session.route_state(), RouteState::StartingRoute);
    assert_eq!(session.graph().edge_count(), 0);

    session.handle(RouteEvent::tap(0.0, 40.0));
    let out = session.handle(RouteEvent::Commit);
    let edge = out.committed.unwrap();
    let edge = session.graph().edge(edge).unwrap();
    let end = session.graph().vertex(edge.end).unwrap();
    assert_eq!(end.point, Point::new(0.0, 40.0));
    assert!(session.graph().vertex_near(Point::new(40.0, 0.0), 0.5).is_none());
}

#[test]
fn test_route_joins_existing_wire_with_tee() {
    let mut session = grid_session();
    session.handle(RouteEvent::tap(0.0, 0.0));
    session.handle(RouteEvent::tap(60.0, 0.0));
    session.handle(RouteEvent::Commit);

    session.handle(RouteEvent::tap(30.0, 40.0));
    let out = session.handle(RouteEvent::tap(30.0, 0.0));
    assert_eq!(session.route_state(), RouteState::Idle);
    assert!(out.committed.is_some());

    let junction = session.graph().vertex_near(Point::new(30.0, 0.0), 0.01).unwrap();
    assert_eq!(session.graph().degree(junction), 3);
    assert_eq!(session.graph().edge_count(), 3);
    assert_eq!(session.graph().islands().len(), 1);
}

#[test]
fn test_pin_placed_mid_route_survives_commit() {
    let mut session = grid_session();
    session.handle(RouteEvent::tap(0.0, 0.0));
    let placed = session.engine_mut().apply(&InsertVertex::pin(
        Point::new(0.0, 0.0),
        OwnerId::new(),
        "1",
    ));
    let pin = placed.vertex.unwrap();

    session.handle(RouteEvent::Commit);
    assert_eq!(session.route_state(), RouteState::Idle);
    assert!(session.graph().contains_vertex(pin));
    assert!(session.graph().vertex(pin).unwrap().ownership.is_pin());
    assert_eq!(session.graph().vertex_count(), 1);
}

#[test]
fn test_route_around_off_grid_pin_stays_axis_aligned() {
    let mut session = grid_session();
    let owner = OwnerId::new();
    session
        .engine_mut()
        .apply(&InsertVertex::pin(Point::new(12.0, 7.0), owner, "2"));

    session.handle(RouteEvent::tap(0.0, 0.0));
    session.handle(RouteEvent::tap(12.0, 7.0));
    assert_eq!(session.route_state(), RouteState::Idle);

    session.handle(RouteEvent::tap(12.0, 7.0));
    session.handle(RouteEvent::tap(41.0, 29.0));
    session.handle(RouteEvent::Commit);
    assert_eq!(session.route_state(), RouteState::Idle);

    let policy = session.engine().policy();
    let graph = session.graph();
    assert_eq!(graph.edge_count(), 4);
    for edge in graph.edges() {
        let a = graph.vertex(edge.start).unwrap().point;
        let b = graph.vertex(edge.end).unwrap().point;
        assert!(
            policy.is_horizontal(a, b) || policy.is_vertical(a, b),
            "{} runs diagonally from {} to {}",
            edge.id,
            a,
            b
        );
    }
    let pin = graph.vertex_near(Point::new(12.0, 7.0), 0.01).unwrap();
    assert_eq!(graph.degree(pin), 2);
}

#[test]
fn test_replay_fixture_scenario() {
    let report = routegraph::replay_file(&fixture_path("tap_tap_escape.json")).unwrap();
    assert_eq!(report.final_state, RouteState::Idle);
    assert_eq!(report.graph, GraphSnapshot::default());
    let states: Vec<RouteState> = report.events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            RouteState::StartingRoute,
            RouteState::StartingRoute,
            RouteState::Idle
        ]
    );
}

#[test]
fn test_replay_l_route() {
    let report = routegraph::replay_file(&fixture_path("l_route.json")).unwrap();
    assert_eq!(report.final_state, RouteState::Idle);
    assert_eq!(report.graph.vertices.len(), 3);
    assert_eq!(report.graph.edges.len(), 2);
    assert_eq!(report.committed_edges().count(), 1);

    let preview = report.events[1].preview.as_ref().unwrap();
    assert_eq!(preview.len(), 3);
    for edge in &report.graph.edges {
        assert_eq!(edge.style.width, 0.5);
        assert_eq!(edge.style.layer, LayerId(1));
    }
}

#[test]
fn test_replay_pin_to_bus() {
    let report = routegraph::replay_file(&fixture_path("pin_to_bus.json")).unwrap();
    assert_eq!(report.final_state, RouteState::Idle);
    assert_eq!(report.graph.vertices.len(), 4);
    assert_eq!(report.graph.edges.len(), 3);
    assert_eq!(report.islands, 1);
    assert!(report.events[1].committed.is_some());

    let script = EventScript::from_path(&fixture_path("pin_to_bus.json")).unwrap();
    let audit = audit(&report.graph, &script.policy, &script.options).unwrap();
    assert!(audit.is_clean());
}

#[test]
fn test_replay_reports_pin_conflict() {
    let report = routegraph::replay_file(&fixture_path("pin_conflict.json")).unwrap();
    let conflicts: Vec<_> = report.conflicts().collect();
    assert!(!conflicts.is_empty());
    assert_eq!(conflicts[0].first, VertexId(1));
    assert_eq!(conflicts[0].second, VertexId(2));

    // Both pins are still there
    let pins = report
        .graph
        .vertices
        .iter()
        .filter(|v| v.ownership.is_pin())
        .count();
    assert_eq!(pins, 2);
}

#[test]
fn test_replay_rejects_dangling_snapshot() {
    let result = routegraph::replay_file(&fixture_path("dangling_edge.json"));
    assert!(matches!(
        result,
        Err(RouteGraphError::DanglingEdge { .. })
    ));
}

#[test]
fn test_audit_flags_unresolved_fixture() {
    let script = EventScript::from_path(&fixture_path("unresolved_chain.json")).unwrap();
    let report = Session::replay(&script).unwrap();
    let audit = audit(&report.graph, &script.policy, &script.options).unwrap();
    assert!(!audit.is_clean());
    assert_eq!(audit.unstable_vertices, vec![VertexId(2)]);
}

#[test]
fn test_missing_script_is_io_error() {
    let result = routegraph::replay_file(&fixture_path("does_not_exist.json"));
    assert!(matches!(result, Err(RouteGraphError::Io(_))));
}
