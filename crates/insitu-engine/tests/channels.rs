//! Integration test: channel ingestion through `execute`.
//!
//! A step's channels are refreshed in declaration order. A channel that
//! fails validation or ingestion is skipped on its own; the rest of the
//! step proceeds and pipelines only see the channels that were refreshed.

use insitu_core::Node;
use insitu_engine::pipeline::Phase;
use insitu_engine::{Collaborators, DispatchError, Dispatcher, EngineConfig, PipelineKind};
use insitu_test_utils::envelopes::{self, channel, mesh_channel, mesh_data};
use insitu_test_utils::fixtures::{CallLog, ChannelWatcher};
use insitu_test_utils::MockStepSources;
use serde_json::json;

fn ready(collaborators: Collaborators) -> Dispatcher {
    let mut d = Dispatcher::with_collaborators(EngineConfig::default(), collaborators);
    d.initialize(&Node::Null).unwrap();
    d
}

// ── Mesh channels ────────────────────────────────────────────────────

#[test]
fn two_mesh_channels_get_two_producers() {
    let mut d = ready(Collaborators::none());
    let mut step = envelopes::execute(3, 0.3, vec![("fluid", mesh_channel()), ("solid", mesh_channel())]);

    let report = d.execute(&mut step).unwrap();
    assert_eq!(report.refreshed, vec!["fluid".to_string(), "solid".to_string()]);
    assert!(report.skipped.is_empty());

    for name in ["fluid", "solid"] {
        let p = d.registry().get_producer(name).unwrap();
        assert_eq!(p.channel(), name);
        assert!(p.is_modified());
        assert_eq!(p.field_data().child("timestep"), Some(&Node::Int(3)));
        assert_eq!(p.field_data().child("time"), Some(&Node::Float(0.3)));
        assert_eq!(p.payload(), &mesh_data());
    }
}

#[test]
fn unsupported_channel_type_is_skipped_alone() {
    let mut d = ready(Collaborators::none());
    let mut step = envelopes::execute(
        0,
        0.0,
        vec![
            ("grid", mesh_channel()),
            ("particles", channel("point_cloud", mesh_data())),
            ("boundary", mesh_channel()),
        ],
    );

    let report = d.execute(&mut step).unwrap();
    assert!(!report.failed);
    assert!(report.was_refreshed("grid"));
    assert!(report.was_refreshed("boundary"));
    assert!(report.was_skipped("particles"));
    let reason = &report.skipped[0].reason;
    assert!(reason.contains("point_cloud"), "reason was: {reason}");
    assert!(!d.registry().contains("particles"));
}

#[test]
fn invalid_mesh_is_skipped_and_valid_one_kept() {
    let mut d = ready(Collaborators::none());
    let mut step = envelopes::execute(
        0,
        0.0,
        vec![
            ("broken", channel("mesh", envelopes::invalid_mesh_data())),
            ("grid", mesh_channel()),
        ],
    );

    let report = d.execute(&mut step).unwrap();
    assert_eq!(report.refreshed, vec!["grid".to_string()]);
    assert!(report.skipped[0].reason.contains("coordsets"));
}

#[test]
fn malformed_state_rejects_the_whole_step() {
    let mut d = ready(Collaborators::none());
    let mut step = envelopes::execute_grid(0, 0.0);
    step.set_path("state/time", "soon");

    let err = d.execute(&mut step).unwrap_err();
    match err {
        DispatchError::InvalidNode(e) => assert_eq!(e.path, "state/time"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(d.registry().is_empty());
    assert_eq!(d.steps(), 0);
}

#[test]
fn changing_a_channel_type_skips_it() {
    let mut d = ready(Collaborators::none());
    let mut first = envelopes::execute_grid(0, 0.0);
    d.execute(&mut first).unwrap();

    let mut second = envelopes::execute(1, 0.1, vec![("grid", envelopes::multimesh_channel(2))]);
    let report = d.execute(&mut second).unwrap();
    assert!(report.was_skipped("grid"));
    assert!(report.skipped[0].reason.contains("changed"));
    assert!(!d.registry().get_producer("grid").unwrap().is_multimesh());
}

#[test]
fn multimesh_channel_keeps_blocks_and_assembly() {
    let mut d = ready(Collaborators::none());
    let mut ch = envelopes::multimesh_channel(3);
    ch.insert("assembly", Node::from(json!({"left": ["block_0"], "right": ["block_1", "block_2"]})));
    let mut step = envelopes::execute(0, 0.0, vec![("blocks", ch)]);
    step.set_path("state/multiblock", 1);

    d.execute(&mut step).unwrap();
    let p = d.registry().get_producer("blocks").unwrap();
    assert!(p.is_multimesh());
    assert!(p.output_multiblock());
    assert_eq!(p.payload().num_children(), 3);
    assert!(p.assembly().is_some_and(Node::is_object));
}

#[test]
fn channel_state_overrides_the_step_stamp() {
    let mut d = ready(Collaborators::none());
    let mut ch = mesh_channel();
    ch.set_path("state/time", 9.5);
    ch.set_path("state/fields/run", "alpha");
    let mut step = envelopes::execute(2, 1.0, vec![("grid", ch)]);

    d.execute(&mut step).unwrap();
    let fd = d.registry().get_producer("grid").unwrap().field_data();
    assert_eq!(fd.child("time"), Some(&Node::Float(9.5)));
    assert_eq!(fd.child("timestep"), Some(&Node::Int(2)));
    assert_eq!(fd.get_path("fields/run").and_then(Node::as_str), Some("alpha"));
}

#[test]
fn pipelines_see_only_refreshed_channels() {
    let log = CallLog::new();
    let mut d = ready(Collaborators::none());
    d.register_pipeline(PipelineKind::custom(ChannelWatcher::new("watcher", "grid", &log)))
        .unwrap();

    let mut good = envelopes::execute_grid(0, 0.0);
    assert!(!d.execute(&mut good).unwrap().failed);

    let mut bad = envelopes::execute(1, 0.1, vec![("grid", channel("mesh", envelopes::invalid_mesh_data()))]);
    let report = d.execute(&mut bad).unwrap();
    assert!(report.failed);
    assert_eq!(report.failed_pipelines.as_slice(), ["watcher".to_string()]);
    assert_eq!(log.count("watcher", Phase::Execute), 2);
}

// ── Step-stream channels ─────────────────────────────────────────────

fn fides_channel() -> Node {
    channel("fides", Node::from(json!({"engine": "SST", "stream": "run.bp"})))
}

#[test]
fn fides_channel_reads_steps_and_reports_time() {
    let sources = MockStepSources::new([(0.25, mesh_data()), (0.5, mesh_data())]);
    let mut d = ready(Collaborators::none().with_step_sources(sources.clone()));

    for (timestep, expected) in [(0, 0.25), (1, 0.5)] {
        let mut step = envelopes::execute(timestep, 0.0, vec![("stream", fides_channel())]);
        let report = d.execute(&mut step).unwrap();
        assert!(report.was_refreshed("stream"));
        assert_eq!(
            step.get_path("channels/stream/state/time"),
            Some(&Node::Float(expected))
        );
        let p = d.registry().get_producer("stream").unwrap();
        assert_eq!(p.field_data().child("time"), Some(&Node::Float(expected)));
    }
    assert_eq!(sources.opened(), 1, "the step source is opened once per channel");

    let mut exhausted = envelopes::execute(2, 0.0, vec![("stream", fides_channel())]);
    let report = d.execute(&mut exhausted).unwrap();
    assert!(report.was_skipped("stream"));
    assert!(report.skipped[0].reason.contains("no more steps"));
}

#[test]
fn fides_without_a_reader_is_skipped_each_step() {
    let mut d = ready(Collaborators::none());
    for timestep in 0..2 {
        let mut step = envelopes::execute(timestep, 0.0, vec![("stream", fides_channel()), ("grid", mesh_channel())]);
        let report = d.execute(&mut step).unwrap();
        assert!(report.was_skipped("stream"));
        assert!(report.was_refreshed("grid"));
    }
}
