//! Integration test: whole envelopes against each protocol.
//!
//! Every rejection must name the offending path relative to `catalyst`.

use insitu_blueprint::{BlueprintMeshSchema, Protocol, Validator};
use insitu_core::Node;
use serde_json::json;

fn node(value: serde_json::Value) -> Node {
    Node::from(value)
}

fn mesh() -> serde_json::Value {
    json!({
        "coordsets": {"coords": {"type": "uniform", "dims": {"i": 3, "j": 3}}},
        "topologies": {"mesh": {"type": "uniform", "coordset": "coords"}},
        "fields": {
            "pressure": {"association": "element", "topology": "mesh", "values": [1.0, 2.0, 3.0, 4.0]}
        }
    })
}

fn error_path(protocol: Protocol, envelope: serde_json::Value) -> String {
    Validator::new(&BlueprintMeshSchema)
        .verify_detailed(protocol, &node(envelope))
        .expect_err("envelope should be rejected")
        .path
}

// ── initialize ───────────────────────────────────────────────────────

#[test]
fn full_initialize_envelope_passes() {
    let envelope = node(json!({
        "scripts": ["render.rhai", {"filename": "slice.rhai", "args": ["--axis", "z"]}],
        "pipelines": {"writer": {"type": "io", "filename": "out_%04d.json", "channel": "grid"}},
        "proxies": ["filters.xml"],
        "mpi_comm": 7
    }));
    assert!(Validator::new(&BlueprintMeshSchema).verify(Protocol::Initialize, &envelope));
}

#[test]
fn initialize_rejections_name_the_path() {
    assert_eq!(
        error_path(Protocol::Initialize, json!({"scripts": [{"args": ["x"]}]})),
        "scripts/0/filename"
    );
    assert_eq!(
        error_path(
            Protocol::Initialize,
            json!({"pipelines": {"writer": {"type": "io", "channel": "grid"}}})
        ),
        "pipelines/writer/filename"
    );
    assert_eq!(error_path(Protocol::Initialize, json!({"mpi_comm": "world"})), "mpi_comm");
}

// ── execute ──────────────────────────────────────────────────────────

#[test]
fn full_execute_envelope_passes() {
    let envelope = node(json!({
        "state": {"timestep": 3, "time": 0.3, "multiblock": 1, "pipelines": ["writer"], "parameters": ["a=1"]},
        "channels": {
            "grid": {"type": "mesh", "data": mesh(), "state": {"fields": {"run": "alpha"}}},
            "blocks": {"type": "multimesh", "data": {"b0": mesh(), "b1": mesh()}, "assembly": ["b0", "b1"]},
            "db": {"type": "ioss", "data": {"file": "run.e"}}
        }
    }));
    let validator = Validator::new(&BlueprintMeshSchema);
    assert!(validator.verify(Protocol::Execute, &envelope));
    assert!(validator.verify_execute_envelope(&envelope).is_ok());
}

#[test]
fn cycle_may_stand_in_for_timestep() {
    let envelope = node(json!({"state": {"cycle": 10, "time": 1.0}}));
    assert!(Validator::new(&BlueprintMeshSchema).verify(Protocol::Execute, &envelope));
}

#[test]
fn execute_rejections_name_the_path() {
    assert_eq!(error_path(Protocol::Execute, json!({"channels": {}})), "state");
    assert_eq!(
        error_path(Protocol::Execute, json!({"state": {"time": 0.0}})),
        "state/timestep"
    );
    assert_eq!(
        error_path(
            Protocol::Execute,
            json!({"state": {"timestep": 0, "time": 0.0}, "channels": {"grid": {"type": "mesh"}}})
        ),
        "channels/grid/data"
    );
    let mut bad_mesh = mesh();
    bad_mesh["fields"]["pressure"]["topology"] = json!("nowhere");
    assert_eq!(
        error_path(
            Protocol::Execute,
            json!({"state": {"timestep": 0, "time": 0.0}, "channels": {"grid": {"type": "mesh", "data": bad_mesh}}})
        ),
        "channels/grid/data/fields/pressure/topology"
    );
}

#[test]
fn envelope_check_defers_channel_contents() {
    let envelope = node(json!({
        "state": {"timestep": 0, "time": 0.0},
        "channels": {"grid": {"type": "voxels", "data": {}}}
    }));
    let validator = Validator::new(&BlueprintMeshSchema);
    assert!(validator.verify_execute_envelope(&envelope).is_ok());
    let channel = envelope.get_path("channels/grid").unwrap();
    let err = validator.verify_channel("grid", channel).unwrap_err();
    assert_eq!(err.path, "channels/grid/type");
}

// ── finalize ─────────────────────────────────────────────────────────

#[test]
fn finalize_accepts_anything() {
    let validator = Validator::new(&BlueprintMeshSchema);
    assert!(validator.verify(Protocol::Finalize, &Node::Null));
    assert!(validator.verify(Protocol::Finalize, &node(json!({"anything": [1, 2]}))));
}
