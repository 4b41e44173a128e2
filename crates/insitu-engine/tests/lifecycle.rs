//! Integration test: process-level lifecycle ordering.
//!
//! Covers the call-order rules (execute before initialize, repeated
//! initialize, finalize without executes) and the property that finalize
//! reaches exactly the pipelines whose initialize succeeded.

use insitu_core::{LifecycleError, Node};
use insitu_engine::pipeline::Phase;
use insitu_engine::{Collaborators, DispatchError, Dispatcher, EngineConfig, Lifecycle, PipelineKind};
use insitu_test_utils::envelopes;
use insitu_test_utils::fixtures::{CallLog, CountingPipeline, FailingPipeline};
use proptest::prelude::*;

fn dispatcher() -> Dispatcher {
    Dispatcher::with_collaborators(EngineConfig::default(), Collaborators::none())
}

// ── Call order ───────────────────────────────────────────────────────

#[test]
fn execute_before_initialize_is_rejected_without_side_effects() {
    let mut d = dispatcher();
    let mut step = envelopes::execute_grid(0, 0.0);
    let err = d.execute(&mut step).unwrap_err();
    assert!(matches!(err, DispatchError::Lifecycle(LifecycleError::NotInitialized)));
    assert!(d.registry().is_empty());
    assert_eq!(d.steps(), 0);
    assert_eq!(d.lifecycle(), Lifecycle::Uninitialized);
}

#[test]
fn invalid_initialize_leaves_the_dispatcher_uninitialized() {
    let mut d = dispatcher();
    let bad = Node::from(serde_json::json!({"scripts": 3}));
    let err = d.initialize(&bad).unwrap_err();
    match err {
        DispatchError::InvalidNode(e) => assert_eq!(e.path, "scripts"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(d.lifecycle(), Lifecycle::Uninitialized);

    d.initialize(&Node::Null).unwrap();
    assert_eq!(d.lifecycle(), Lifecycle::Initialized);
}

#[test]
fn second_initialize_is_ignored() {
    let mut d = dispatcher();
    d.initialize(&envelopes::initialize_io("a.json", "grid")).unwrap();
    d.initialize(&envelopes::initialize_io("b.json", "grid")).unwrap();
    assert_eq!(d.pipelines().len(), 1);
}

#[test]
fn finalize_with_zero_executes_skips_uninitialized_pipelines() {
    let log = CallLog::new();
    let mut d = dispatcher();
    d.initialize(&Node::Null).unwrap();
    d.register_pipeline(PipelineKind::custom(CountingPipeline::new("counter", &log)))
        .unwrap();

    d.finalize().unwrap();
    assert!(log.is_empty(), "a never-initialized pipeline must not be finalized");
    assert_eq!(d.lifecycle(), Lifecycle::Finalized);
    assert!(d.pipelines().is_empty());
}

#[test]
fn finalize_twice_is_a_warning_and_later_calls_fail() {
    let mut d = dispatcher();
    d.initialize(&Node::Null).unwrap();
    d.finalize().unwrap();
    d.finalize().unwrap();

    let mut step = envelopes::execute_grid(1, 0.1);
    assert!(matches!(
        d.execute(&mut step),
        Err(DispatchError::Lifecycle(LifecycleError::Finalized))
    ));
    assert!(matches!(
        d.results(&mut Node::object()),
        Err(DispatchError::Lifecycle(LifecycleError::Finalized))
    ));
}

#[test]
fn finalize_before_initialize_is_an_error() {
    let mut d = dispatcher();
    assert!(matches!(
        d.finalize(),
        Err(DispatchError::Lifecycle(LifecycleError::NotInitialized))
    ));
}

#[test]
fn finalize_releases_channels_and_producers() {
    let mut d = dispatcher();
    d.initialize(&Node::Null).unwrap();
    let mut step = envelopes::execute_grid(0, 0.0);
    d.execute(&mut step).unwrap();
    assert!(d.registry().contains("grid"));

    d.finalize().unwrap();
    assert!(d.registry().is_empty());
}

// ── Finalize reaches exactly the initialized pipelines ───────────────

proptest! {
    #[test]
    fn finalize_matches_successful_initializes(fails in prop::collection::vec(any::<bool>(), 1..6)) {
        let log = CallLog::new();
        let mut d = dispatcher();
        d.initialize(&Node::Null).unwrap();
        for (i, fail) in fails.iter().enumerate() {
            let name = format!("p{i}");
            let kind = if *fail {
                PipelineKind::custom(FailingPipeline::new(&name, &log, Phase::Initialize, 0))
            } else {
                PipelineKind::custom(CountingPipeline::new(&name, &log))
            };
            d.register_pipeline(kind).unwrap();
        }

        let mut step = envelopes::execute(0, 0.0, Vec::new());
        d.execute(&mut step).unwrap();
        d.finalize().unwrap();

        for (i, fail) in fails.iter().enumerate() {
            let name = format!("p{i}");
            prop_assert_eq!(log.count(&name, Phase::Initialize), 1);
            prop_assert_eq!(log.count(&name, Phase::Execute), usize::from(!fail));
            prop_assert_eq!(log.count(&name, Phase::Finalize), usize::from(!fail));
        }
    }
}
