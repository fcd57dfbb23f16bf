//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the routegraph-cli binary (finds it in target/debug when run via cargo test).
fn routegraph_cli() -> Command {
    cargo_bin_cmd!("routegraph-cli")
}

/// Path to routegraph library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("routegraph")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = routegraph_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("routing"))
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn test_cli_version() {
    let mut cmd = routegraph_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_replay_human() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("l_route.json");

    cmd.arg("replay").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("manhattan grid, step 10"))
        .stdout(predicate::str::contains("committed"))
        .stdout(predicate::str::contains("Edges:        2"));
}

#[test]
fn test_cli_replay_json_output() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("tap_tap_escape.json");

    cmd.arg("replay").arg(path).arg("--format").arg("json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["final_state"], "idle");
    assert_eq!(report["events"].as_array().unwrap().len(), 3);
    assert_eq!(report["graph"]["vertices"].as_array().unwrap().len(), 0);
}

#[test]
fn test_cli_grid_override() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("l_route.json");

    cmd.arg("replay")
        .arg(path)
        .arg("--grid")
        .arg("5")
        .arg("--format")
        .arg("json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["policy"]["kind"], "manhattan");
    assert_eq!(report["policy"]["step"], 5.0);
}

#[test]
fn test_cli_invalid_grid_step() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("l_route.json");

    cmd.arg("replay").arg(path).arg("--grid").arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_check_clean_graph() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("pin_to_bus.json");

    cmd.arg("check").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("consistent and stable"));
}

#[test]
fn test_cli_check_unresolved_graph() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("unresolved_chain.json");

    cmd.arg("check").arg(path);

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("UNSTABLE"))
        .stdout(predicate::str::contains("vertex v2"));
}

#[test]
fn test_cli_check_json_output() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("unresolved_chain.json");

    cmd.arg("check").arg(path).arg("--format").arg("json");

    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["clean"], false);
    assert_eq!(result["audit"]["unstable_vertices"][0], 2);
}

#[test]
fn test_cli_check_dangling_edge() {
    let mut cmd = routegraph_cli();
    let path = fixtures_dir().join("dangling_edge.json");

    cmd.arg("check").arg(path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_replay_nonexistent_file() {
    let mut cmd = routegraph_cli();

    cmd.arg("replay").arg("does_not_exist.json");

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load script"));
}

#[test]
fn test_cli_rules_command() {
    let mut cmd = routegraph_cli();

    cmd.arg("rules");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("grid_snap"))
        .stdout(predicate::str::contains("collinear_merge"))
        .stdout(predicate::str::contains("isolated_cull"));
}

#[test]
fn test_cli_rules_verbose() {
    let mut cmd = routegraph_cli();

    cmd.arg("rules").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("at most 8"));
}

#[test]
fn test_cli_script_from_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("route.json");
    std::fs::write(
        &path,
        r#"{
            "policy": { "kind": "manhattan", "step": 10.0 },
            "events": [
                { "type": "tap", "x": 0.0, "y": 0.0 },
                { "type": "tap", "x": 0.0, "y": 20.0 },
                { "type": "tap", "x": 0.0, "y": 50.0 },
                { "type": "commit" }
            ]
        }"#,
    )
    .unwrap();

    let mut cmd = routegraph_cli();
    cmd.arg("check").arg(&path);
    cmd.assert().success();

    let mut cmd = routegraph_cli();
    let output = cmd
        .arg("replay")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // The straight run collapses to a single edge
    assert_eq!(report["graph"]["edges"].as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_output_formats_are_different() {
    let path = fixtures_dir().join("l_route.json");

    let human = routegraph_cli()
        .arg("replay")
        .arg(&path)
        .output()
        .unwrap();
    let json = routegraph_cli()
        .arg("replay")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();

    assert_ne!(human.stdout, json.stdout);
}
