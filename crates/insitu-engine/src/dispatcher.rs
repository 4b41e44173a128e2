//! The dispatcher: process-level lifecycle and per-step orchestration.
//!
//! [`Dispatcher`] owns everything a co-processing session accumulates: the
//! channel/producer [`Registry`], the channel adapters, the registered
//! pipelines with their lifecycle state, the [`Steering`] table and the
//! [`Collaborators`]. It is an explicit context object; the host (or the
//! `insitu` facade) owns it and passes the `catalyst` subtree of each
//! envelope into the matching method.
//!
//! # Lifecycle
//!
//! `Uninitialized → Initialized → Finalized`, one-way. A repeated
//! [`initialize`](Dispatcher::initialize) or
//! [`finalize`](Dispatcher::finalize) logs a warning and succeeds without
//! doing anything. Every other operation outside the `Initialized` state
//! is a [`LifecycleError`].
//!
//! # Execute
//!
//! One [`execute`](Dispatcher::execute) call validates the envelope,
//! refreshes every declared channel in declaration order (a bad channel
//! is skipped alone), pushes pending steering values, and then runs the
//! working set of pipelines in registration order. Pipeline failures are
//! sticky and reported through the [`ExecuteReport`].
//!
//! All methods take `&mut self`, so a pipeline can never re-enter the
//! dispatcher that is driving it.

use indexmap::map::Entry;
use indexmap::IndexMap;
use insitu_blueprint::{ChannelType, Protocol, Validator};
use insitu_core::{LifecycleError, Node, SchemaError, StepStamp};
use smallvec::SmallVec;
use thiserror::Error;

use crate::channel::{ChannelAdapter, ChannelInput, ChannelKind};
use crate::collaborators::Collaborators;
use crate::config::{ConfigError, EngineConfig, FailureReporting, InitConfig, PipelineSpecKind};
use crate::io_pipeline::IoPipeline;
use crate::pipeline::{Pipeline, PipelineContext, PipelineKind, PipelineSlot, PipelineState};
use crate::registry::Registry;
use crate::report::{ExecuteReport, SkippedChannel};
use crate::script::ScriptPipeline;
use crate::steering::Steering;

// Compile-time assertion: Dispatcher can be moved into a shared handle.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Dispatcher>();
    }
};

// ── DispatchError ──────────────────────────────────────────────────

/// Errors returned by [`Dispatcher`] operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The node failed protocol validation.
    #[error("invalid node: {0}")]
    InvalidNode(#[from] SchemaError),
    /// The operation is not allowed in the current lifecycle state.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The engine configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A pipeline with the same name is already registered.
    #[error("a pipeline named '{name}' is already registered")]
    DuplicatePipeline {
        /// The contested name.
        name: String,
    },
    /// At least one pipeline's results hook has failed.
    #[error("results failed for pipeline(s): {}", pipelines.join(", "))]
    ResultsFailed {
        /// Pipelines with a sticky results failure, in registration order.
        pipelines: Vec<String>,
    },
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Process-level lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Before [`Dispatcher::initialize`].
    #[default]
    Uninitialized,
    /// Between initialize and finalize.
    Initialized,
    /// After [`Dispatcher::finalize`]; all state has been released.
    Finalized,
}

// ── Dispatcher ─────────────────────────────────────────────────────

/// Owner of all co-processing state for one simulation process.
pub struct Dispatcher {
    lifecycle: Lifecycle,
    config: EngineConfig,
    collaborators: Collaborators,
    registry: Registry,
    steering: Steering,
    adapters: IndexMap<String, ChannelKind>,
    pipelines: Vec<PipelineSlot>,
    refreshed: Vec<String>,
    stamp: StepStamp,
    mpi_comm: Option<i64>,
    steps: u64,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("lifecycle", &self.lifecycle)
            .field("config", &self.config)
            .field("collaborators", &self.collaborators)
            .field("channels", &self.adapters.keys().collect::<Vec<_>>())
            .field("pipelines", &self.pipelines)
            .field("stamp", &self.stamp)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Dispatcher {
    /// Dispatcher with the default [`Collaborators`].
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(config, Collaborators::default())
    }

    /// Dispatcher with an explicit collaborator set.
    pub fn with_collaborators(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            config,
            collaborators,
            registry: Registry::new(),
            steering: Steering::new(),
            adapters: IndexMap::new(),
            pipelines: Vec::new(),
            refreshed: Vec::new(),
            stamp: StepStamp::default(),
            mpi_comm: None,
            steps: 0,
        }
    }

    // ── Lifecycle operations ───────────────────────────────────────

    /// Validate `catalyst` under the `initialize` protocol and build the
    /// declared pipelines.
    ///
    /// Script pipelines come first, then `pipelines` entries, each in
    /// declaration order. Entries of an unknown `type` are logged and
    /// skipped. On a validation failure the dispatcher stays
    /// uninitialized.
    pub fn initialize(&mut self, catalyst: &Node) -> Result<(), DispatchError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Initialized => {
                tracing::warn!("initialize called more than once; ignoring");
                return Ok(());
            }
            Lifecycle::Finalized => {
                tracing::warn!("initialize called after finalize; ignoring");
                return Ok(());
            }
        }
        self.config.validate()?;
        if let Err(e) = Validator::new(self.collaborators.mesh_schema())
            .verify_detailed(Protocol::Initialize, catalyst)
        {
            log_rejection(Protocol::Initialize, &e);
            return Err(e.into());
        }

        let init = InitConfig::from_node(catalyst);
        for script in &init.scripts {
            let kind = PipelineKind::Script(ScriptPipeline::new(
                &script.name,
                &script.filename,
                script.args.clone(),
            ));
            self.add_declared(kind);
        }
        for spec in &init.pipelines {
            match &spec.kind {
                PipelineSpecKind::Io { filename, channel } => {
                    self.add_declared(PipelineKind::Io(IoPipeline::new(&spec.name, filename, channel)));
                }
                PipelineSpecKind::Other(ty) => {
                    tracing::warn!(pipeline = %spec.name, pipeline_type = %ty, "unknown pipeline type; skipping");
                }
            }
        }

        if !init.proxies.is_empty() {
            match self.collaborators.proxies.as_deref_mut() {
                Some(loader) => {
                    for filename in &init.proxies {
                        if let Err(e) = loader.load(filename) {
                            tracing::error!(proxy = %filename, "cannot load proxy: {e}");
                        }
                    }
                }
                None => tracing::warn!(
                    count = init.proxies.len(),
                    "proxies declared but no proxy loader is installed"
                ),
            }
        }
        self.mpi_comm = init.mpi_comm;

        self.lifecycle = Lifecycle::Initialized;
        if self.config.is_root() {
            tracing::info!(
                pipelines = self.pipelines.len(),
                scripting = self.collaborators.scripting_available(),
                "insitu initialized"
            );
        }
        Ok(())
    }

    /// Add a host-built pipeline after initialize.
    ///
    /// Names must be unique among registered pipelines.
    pub fn register_pipeline(&mut self, kind: PipelineKind) -> Result<(), DispatchError> {
        self.ready()?;
        self.add_pipeline(kind)
    }

    /// Process one simulation step.
    ///
    /// Returns the step report; `report.failed` is set when the failure
    /// scan (see [`FailureReporting`]) finds failed pipelines. Channel
    /// problems never fail the step.
    pub fn execute(&mut self, catalyst: &mut Node) -> Result<ExecuteReport, DispatchError> {
        self.ready()?;
        if let Err(e) = Validator::new(self.collaborators.mesh_schema()).verify_execute_envelope(catalyst) {
            log_rejection(Protocol::Execute, &e);
            return Err(e.into());
        }

        let state = catalyst.child("state");
        let stamp = StepStamp::from_state(state, StepStamp::default());
        let multiblock = state
            .and_then(|s| s.child("multiblock"))
            .and_then(Node::as_i64)
            .is_some_and(|m| m != 0);
        let working_set = state.and_then(|s| s.child("pipelines")).map(strings);
        let parameters = state.and_then(|s| s.child("parameters")).map(strings);
        self.stamp = stamp;
        self.steps += 1;
        tracing::debug!(timestep = stamp.timestep, time = stamp.time, "execute");

        let mut report = ExecuteReport {
            timestep: stamp.timestep,
            time: stamp.time,
            ..ExecuteReport::default()
        };

        // Channels, in declaration order.
        let names: Vec<String> = catalyst
            .child("channels")
            .map(|c| c.entries().map(|(name, _)| name.into_owned()).collect())
            .unwrap_or_default();
        for name in names {
            let Some(node) = catalyst.child_mut("channels").and_then(|c| c.child_mut(&name)) else {
                continue;
            };
            match refresh_channel(
                &self.collaborators,
                &mut self.adapters,
                &mut self.registry,
                &name,
                node,
                stamp,
                multiblock,
            ) {
                Ok(()) => {
                    tracing::trace!(channel = %name, "channel refreshed");
                    report.refreshed.push(name);
                }
                Err(reason) => {
                    tracing::warn!(channel = %name, %reason, "skipping channel");
                    report.skipped.push(SkippedChannel { name, reason });
                }
            }
        }

        // Steering values land before any pipeline reads the meshes.
        report.steering_applied = self
            .steering
            .flush(self.collaborators.mesh_initializer.as_deref_mut(), &mut self.registry);

        let mut failed_now: SmallVec<[String; 4]> = SmallVec::new();
        for slot in &mut self.pipelines {
            if let Some(set) = &working_set {
                if !set.iter().any(|n| n == slot.name()) {
                    continue;
                }
            }
            let mut ctx = PipelineContext::new(
                &mut self.registry,
                &mut self.steering,
                self.collaborators.writers.as_deref(),
                self.collaborators.scripts.as_deref(),
                &self.config,
                &report.refreshed,
                stamp,
            );
            let first_use = slot.state() == PipelineState::Uninitialized;
            if !slot.ensure_initialized(&mut ctx) {
                if first_use {
                    failed_now.push(slot.name().to_string());
                }
                continue;
            }
            if !slot.executable() {
                continue;
            }
            let ok = slot.execute(&mut ctx, stamp, parameters.as_deref());
            if ok {
                report.executed.push(slot.name().to_string());
            } else {
                failed_now.push(slot.name().to_string());
            }
        }

        report.failed_pipelines = match self.config.failure_reporting {
            FailureReporting::Cumulative => self
                .pipelines
                .iter()
                .filter(|s| s.state().is_failed())
                .map(|s| s.name().to_string())
                .collect(),
            FailureReporting::PerStep => failed_now,
        };
        report.failed = !report.failed_pipelines.is_empty();
        if report.failed {
            tracing::warn!(
                timestep = stamp.timestep,
                pipelines = %report.failed_pipelines.join(", "),
                "step reported as failed"
            );
        }
        tracing::debug!("{report}");
        self.refreshed.clone_from(&report.refreshed);
        Ok(report)
    }

    /// Run every eligible pipeline's results hook and write steerable
    /// producer output to `catalyst/steerable/<channel>`.
    ///
    /// `state/timestep` and `state/time` in `catalyst`, when present,
    /// override the remembered step stamp.
    pub fn results(&mut self, catalyst: &mut Node) -> Result<(), DispatchError> {
        self.ready()?;
        self.stamp = StepStamp::from_state(catalyst.child("state"), self.stamp);

        for slot in &mut self.pipelines {
            let mut ctx = PipelineContext::new(
                &mut self.registry,
                &mut self.steering,
                self.collaborators.writers.as_deref(),
                self.collaborators.scripts.as_deref(),
                &self.config,
                &self.refreshed,
                self.stamp,
            );
            slot.results(&mut ctx);
        }

        for producer in self.registry.steerable() {
            let Some(output) = producer.output() else {
                tracing::trace!(channel = producer.channel(), "steerable producer has no output yet");
                continue;
            };
            if !catalyst.child("steerable").is_some_and(Node::is_object) {
                catalyst.insert("steerable", Node::object());
            }
            if let Some(steerable) = catalyst.child_mut("steerable") {
                steerable.insert(producer.channel(), output.clone());
            }
        }

        let failed: Vec<String> = self
            .pipelines
            .iter()
            .filter(|s| s.results_failed())
            .map(|s| s.name().to_string())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::ResultsFailed { pipelines: failed })
        }
    }

    /// Finalize every pipeline whose initialize succeeded, in registration
    /// order, then release all state.
    pub fn finalize(&mut self) -> Result<(), DispatchError> {
        match self.lifecycle {
            Lifecycle::Initialized => {}
            Lifecycle::Uninitialized => return Err(LifecycleError::NotInitialized.into()),
            Lifecycle::Finalized => {
                tracing::warn!("finalize called more than once; ignoring");
                return Ok(());
            }
        }

        let mut finalized = 0usize;
        for slot in &mut self.pipelines {
            let mut ctx = PipelineContext::new(
                &mut self.registry,
                &mut self.steering,
                self.collaborators.writers.as_deref(),
                self.collaborators.scripts.as_deref(),
                &self.config,
                &self.refreshed,
                self.stamp,
            );
            if slot.finalize(&mut ctx).is_some() {
                finalized += 1;
            }
        }

        self.pipelines.clear();
        self.adapters.clear();
        self.registry.clear();
        self.steering.clear();
        self.refreshed.clear();
        self.lifecycle = Lifecycle::Finalized;
        if self.config.is_root() {
            tracing::info!(finalized, steps = self.steps, "insitu finalized");
        }
        Ok(())
    }

    // ── Other operations ───────────────────────────────────────────

    /// Materialize every producer at `time`. Returns how many produced new
    /// output.
    pub fn update_all(&mut self, time: f64) -> Result<usize, DispatchError> {
        self.ready()?;
        Ok(self.registry.update_all(time))
    }

    /// Block until an external steering client changes something.
    ///
    /// Returns false immediately when no [`ExternalChangeWaiter`](crate::steering::ExternalChangeWaiter)
    /// is installed.
    pub fn wait_for_external_change(&mut self) -> bool {
        match self.collaborators.change_waiter.as_deref_mut() {
            Some(waiter) => waiter.wait_for_external_change(),
            None => false,
        }
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Installed collaborators.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Channel/producer registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry, for host-registered producers.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Steering table.
    pub fn steering(&self) -> &Steering {
        &self.steering
    }

    /// Mutable steering table, for host-set values.
    pub fn steering_mut(&mut self) -> &mut Steering {
        &mut self.steering
    }

    /// Registered pipelines in registration order.
    pub fn pipelines(&self) -> &[PipelineSlot] {
        &self.pipelines
    }

    /// `(name, state)` of every registered pipeline.
    pub fn pipeline_states(&self) -> impl Iterator<Item = (&str, PipelineState)> {
        self.pipelines.iter().map(|s| (s.name(), s.state()))
    }

    /// Step stamp of the most recent execute or results call.
    pub fn stamp(&self) -> StepStamp {
        self.stamp
    }

    /// Communicator handle recorded at initialize.
    pub fn mpi_comm(&self) -> Option<i64> {
        self.mpi_comm
    }

    /// Number of accepted execute calls.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    // ── Internals ──────────────────────────────────────────────────

    fn ready(&self) -> Result<(), LifecycleError> {
        match self.lifecycle {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => Err(LifecycleError::NotInitialized),
            Lifecycle::Finalized => Err(LifecycleError::Finalized),
        }
    }

    fn add_pipeline(&mut self, kind: PipelineKind) -> Result<(), DispatchError> {
        let name = kind.name().to_string();
        if self.pipelines.iter().any(|s| s.name() == name) {
            return Err(DispatchError::DuplicatePipeline { name });
        }
        tracing::debug!(pipeline = %name, variant = kind.variant(), "pipeline registered");
        self.pipelines.push(PipelineSlot::new(kind));
        Ok(())
    }

    fn add_declared(&mut self, kind: PipelineKind) {
        if let Err(e) = self.add_pipeline(kind) {
            tracing::error!("{e}; skipping");
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn log_rejection(protocol: Protocol, e: &SchemaError) {
    tracing::warn!(
        protocol = %protocol,
        path = %e.path,
        reason = %e.reason,
        "node failed protocol validation"
    );
}

fn strings(node: &Node) -> Vec<String> {
    node.entries()
        .filter_map(|(_, n)| n.as_str().map(str::to_string))
        .collect()
}

/// Validate one channel and hand it to its adapter. Errors are the skip
/// reason.
fn refresh_channel(
    collaborators: &Collaborators,
    adapters: &mut IndexMap<String, ChannelKind>,
    registry: &mut Registry,
    name: &str,
    node: &mut Node,
    stamp: StepStamp,
    multiblock: bool,
) -> Result<(), String> {
    Validator::new(collaborators.mesh_schema())
        .verify_channel(name, node)
        .map_err(|e| e.to_string())?;
    let channel_type: ChannelType = node
        .child("type")
        .and_then(Node::as_str)
        .unwrap_or_default()
        .parse()
        .map_err(|e: insitu_blueprint::UnknownName| e.to_string())?;

    let overrides = node.child("state");
    let channel_stamp = StepStamp::from_state(overrides, stamp);
    let multiblock = overrides
        .and_then(|s| s.child("multiblock"))
        .and_then(Node::as_i64)
        .map_or(multiblock, |m| m != 0);

    let adapter = match adapters.entry(name.to_string()) {
        Entry::Occupied(entry) => {
            let adapter = entry.into_mut();
            if adapter.channel_type() != channel_type {
                return Err(format!(
                    "channel type changed from '{}' to '{channel_type}'",
                    adapter.channel_type()
                ));
            }
            adapter
        }
        Entry::Vacant(entry) => {
            let empty = Node::object();
            let data = node.child("data").unwrap_or(&empty);
            let adapter = ChannelKind::create(
                name,
                channel_type,
                data,
                collaborators.step_sources.as_deref(),
            )
            .map_err(|e| e.to_string())?;
            entry.insert(adapter)
        }
    };
    adapter
        .ingest(
            ChannelInput {
                name,
                node,
                stamp: channel_stamp,
                multiblock,
            },
            registry,
        )
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steering::MeshInitializer;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        log: Log,
        init: bool,
        fail_at: Option<i64>,
    }

    impl Recorder {
        fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                log: Arc::clone(log),
                init: true,
                fail_at: None,
            }
        }
    }

    impl Pipeline for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
            self.log.lock().unwrap().push(format!("{} init", self.name));
            self.init
        }

        fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, _time: f64) -> bool {
            let applied = ctx
                .steering_mut()
                .applied("iso", "value")
                .and_then(Node::as_f64);
            self.log
                .lock()
                .unwrap()
                .push(format!("{} exec {timestep} {:?}", self.name, applied));
            self.fail_at != Some(timestep)
        }

        fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
            self.log.lock().unwrap().push(format!("{} results", self.name));
            true
        }

        fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
            self.log.lock().unwrap().push(format!("{} finalize", self.name));
            true
        }
    }

    struct AcceptAll;

    impl MeshInitializer for AcceptAll {
        fn push(&mut self, _target: &str, _values: &Node, _registry: &mut Registry) -> bool {
            true
        }
    }

    fn mesh() -> &'static str {
        r#"{"coordsets": {"c": {"type": "uniform", "dims": {"i": 2}}},
            "topologies": {"t": {"type": "uniform", "coordset": "c"}}}"#
    }

    fn step(timestep: i64, extra_state: &str, channels: &str) -> Node {
        Node::from_json_str(&format!(
            r#"{{"state": {{"timestep": {timestep}, "time": {time}{extra_state}}},
                "channels": {{{channels}}}}}"#,
            time = timestep as f64 * 0.1
        ))
        .unwrap()
    }

    fn ready(config: EngineConfig) -> Dispatcher {
        let mut d = Dispatcher::with_collaborators(config, Collaborators::none());
        d.initialize(&Node::Null).unwrap();
        d
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn operations_before_initialize_are_lifecycle_errors() {
        let mut d = Dispatcher::default();
        let mut node = step(0, "", "");
        assert!(matches!(
            d.execute(&mut node),
            Err(DispatchError::Lifecycle(LifecycleError::NotInitialized))
        ));
        assert!(matches!(d.results(&mut node), Err(DispatchError::Lifecycle(_))));
        assert!(matches!(d.finalize(), Err(DispatchError::Lifecycle(_))));
        assert!(d.update_all(0.0).is_err());
        assert_eq!(d.steps(), 0);
    }

    #[test]
    fn repeated_initialize_and_finalize_are_no_ops() {
        let mut d = ready(EngineConfig::default());
        assert!(d.initialize(&Node::Null).is_ok());
        assert_eq!(d.lifecycle(), Lifecycle::Initialized);
        assert!(d.finalize().is_ok());
        assert!(d.finalize().is_ok());
        assert!(d.initialize(&Node::Null).is_ok());
        assert_eq!(d.lifecycle(), Lifecycle::Finalized);
        let mut node = step(0, "", "");
        assert!(matches!(
            d.execute(&mut node),
            Err(DispatchError::Lifecycle(LifecycleError::Finalized))
        ));
    }

    #[test]
    fn invalid_initialize_leaves_dispatcher_uninitialized() {
        let mut d = Dispatcher::default();
        let bad = Node::from_json_str(r#"{"scripts": [{"args": ["x"]}]}"#).unwrap();
        assert!(matches!(d.initialize(&bad), Err(DispatchError::InvalidNode(_))));
        assert_eq!(d.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn initialize_builds_declared_pipelines_in_order() {
        let mut d = Dispatcher::with_collaborators(EngineConfig::default(), Collaborators::none());
        let node = Node::from_json_str(
            r#"{"scripts": ["/tmp/slice.rhai", {"filename": "iso.rhai", "args": ["0.5"]}],
                "pipelines": [{"type": "io", "filename": "out_%04d.json", "channel": "grid"},
                              {"type": "render"}],
                "mpi_comm": 4}"#,
        )
        .unwrap();
        d.initialize(&node).unwrap();
        let names: Vec<&str> = d.pipeline_states().map(|(n, _)| n).collect();
        assert_eq!(names, ["slice", "iso", "io_0"]);
        assert_eq!(d.mpi_comm(), Some(4));
    }

    #[test]
    fn invalid_envelope_processes_nothing() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))).unwrap();
        let mut node = Node::from_json_str(r#"{"state": {"time": 0.0}}"#).unwrap();
        assert!(matches!(d.execute(&mut node), Err(DispatchError::InvalidNode(_))));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn bad_channel_is_skipped_alone() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))).unwrap();
        let mut node = step(
            1,
            "",
            &format!(
                r#""good": {{"type": "mesh", "data": {m}}},
                   "bad": {{"type": "mesh", "data": {{"coordsets": {{}}}}}},
                   "odd": {{"type": "volume", "data": {{}}}}"#,
                m = mesh()
            ),
        );
        let report = d.execute(&mut node).unwrap();
        assert!(!report.failed);
        assert_eq!(report.refreshed, ["good"]);
        assert!(report.was_skipped("bad"));
        assert!(report.was_skipped("odd"));
        assert!(d.registry().get_producer("bad").is_none());
        let good = d.registry().get_producer("good").unwrap();
        assert!(good.is_modified());
        assert!(good.no_prior_temporal_access());
        assert!(report.was_executed("p"));
    }

    #[test]
    fn channel_state_overrides_global_stamp() {
        let mut d = ready(EngineConfig::default());
        let mut node = step(
            5,
            "",
            &format!(
                r#""grid": {{"type": "mesh", "data": {m}, "state": {{"cycle": 9, "time": 2.5}}}}"#,
                m = mesh()
            ),
        );
        d.execute(&mut node).unwrap();
        let fd = d.registry().get_producer("grid").unwrap().field_data();
        assert_eq!(fd.child("timestep"), Some(&Node::Int(9)));
        assert_eq!(fd.child("time"), Some(&Node::Float(2.5)));
        assert_eq!(d.stamp(), StepStamp::new(5, 0.5));
    }

    #[test]
    fn separate_cycle_reaches_field_data() {
        let mut d = ready(EngineConfig::default());
        let mut node = step(
            5,
            r#", "cycle": 50"#,
            &format!(r#""grid": {{"type": "mesh", "data": {m}}}"#, m = mesh()),
        );
        d.execute(&mut node).unwrap();
        let fd = d.registry().get_producer("grid").unwrap().field_data();
        assert_eq!(fd.child("timestep"), Some(&Node::Int(5)));
        assert_eq!(fd.child("cycle"), Some(&Node::Int(50)));
        assert_eq!(d.stamp(), StepStamp::new(5, 0.5).with_cycle(50));
    }

    #[test]
    fn fides_without_step_sources_is_skipped() {
        let mut d = ready(EngineConfig::default());
        let mut node = step(1, "", r#""stream": {"type": "fides", "data": {}}"#);
        let report = d.execute(&mut node).unwrap();
        assert!(report.was_skipped("stream"));
        assert!(report.skipped[0].reason.contains("unavailable"));
    }

    #[test]
    fn changing_channel_type_is_skipped() {
        let mut d = ready(EngineConfig::default());
        let mut node = step(1, "", r#""db": {"type": "ioss", "data": {}}"#);
        assert!(d.execute(&mut node).unwrap().was_refreshed("db"));
        let mut node = step(2, "", &format!(r#""db": {{"type": "mesh", "data": {}}}"#, mesh()));
        let report = d.execute(&mut node).unwrap();
        assert!(report.skipped[0].reason.contains("changed"));
    }

    #[test]
    fn working_set_and_parameters_are_honored() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        d.register_pipeline(PipelineKind::custom(Recorder::new("a", &log))).unwrap();
        d.register_pipeline(PipelineKind::custom(Recorder::new("b", &log))).unwrap();
        let mut node = step(3, r#", "pipelines": ["b"]"#, "");
        let report = d.execute(&mut node).unwrap();
        assert_eq!(report.executed.as_slice(), ["b"]);
        assert_eq!(entries(&log), ["b init", "b exec 3 None"]);
    }

    #[test]
    fn steering_is_flushed_before_pipelines_run() {
        let log = log();
        let collaborators = Collaborators::none().with_mesh_initializer(AcceptAll);
        let mut d = Dispatcher::with_collaborators(EngineConfig::default(), collaborators);
        d.initialize(&Node::Null).unwrap();
        d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))).unwrap();
        d.steering_mut().set("iso", "value", 0.25);
        let report = d.execute(&mut step(1, "", "")).unwrap();
        assert_eq!(report.steering_applied, 1);
        assert_eq!(entries(&log), ["p init", "p exec 1 Some(0.25)"]);
    }

    #[test]
    fn cumulative_reporting_keeps_failing() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        let mut p = Recorder::new("p", &log);
        p.fail_at = Some(1);
        d.register_pipeline(PipelineKind::custom(p)).unwrap();
        d.register_pipeline(PipelineKind::custom(Recorder::new("q", &log))).unwrap();
        assert!(!d.execute(&mut step(0, "", "")).unwrap().failed);
        assert!(d.execute(&mut step(1, "", "")).unwrap().failed);
        let report = d.execute(&mut step(2, "", "")).unwrap();
        assert!(report.failed);
        assert_eq!(report.failed_pipelines.as_slice(), ["p"]);
        assert_eq!(report.executed.as_slice(), ["q"]);
    }

    #[test]
    fn per_step_reporting_only_counts_this_call() {
        let log = log();
        let mut d = ready(EngineConfig {
            failure_reporting: FailureReporting::PerStep,
            ..EngineConfig::default()
        });
        let mut p = Recorder::new("p", &log);
        p.fail_at = Some(1);
        d.register_pipeline(PipelineKind::custom(p)).unwrap();
        assert!(d.execute(&mut step(1, "", "")).unwrap().failed);
        assert!(!d.execute(&mut step(2, "", "")).unwrap().failed);
    }

    #[test]
    fn failed_initialize_never_executes_or_finalizes() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        let mut p = Recorder::new("p", &log);
        p.init = false;
        d.register_pipeline(PipelineKind::custom(p)).unwrap();
        d.execute(&mut step(1, "", "")).unwrap();
        d.execute(&mut step(2, "", "")).unwrap();
        d.results(&mut Node::object()).unwrap();
        d.finalize().unwrap();
        assert_eq!(entries(&log), ["p init"]);
    }

    #[test]
    fn finalize_without_execute_invokes_nothing() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))).unwrap();
        d.finalize().unwrap();
        assert!(entries(&log).is_empty());
        assert!(d.pipelines().is_empty());
    }

    #[test]
    fn duplicate_pipeline_names_are_rejected() {
        let log = log();
        let mut d = ready(EngineConfig::default());
        d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))).unwrap();
        assert!(matches!(
            d.register_pipeline(PipelineKind::custom(Recorder::new("p", &log))),
            Err(DispatchError::DuplicatePipeline { .. })
        ));
    }

    #[test]
    fn results_writes_steerable_output() {
        let mut d = ready(EngineConfig::default());
        let mut node = step(1, "", &format!(r#""grid": {{"type": "mesh", "data": {}}}"#, mesh()));
        d.execute(&mut node).unwrap();
        d.registry_mut().set_steerable("grid").unwrap();

        let mut out = Node::object();
        d.results(&mut out).unwrap();
        assert!(out.child("steerable").is_none());

        assert_eq!(d.update_all(0.1).unwrap(), 1);
        d.results(&mut out).unwrap();
        assert!(out.has_path("steerable/grid/coordsets/c"));
    }

    #[test]
    fn wait_without_waiter_returns_false() {
        let mut d = Dispatcher::default();
        assert!(!d.wait_for_external_change());
    }
}
