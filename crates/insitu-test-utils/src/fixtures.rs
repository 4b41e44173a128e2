//! Reusable pipeline fixtures.
//!
//! - [`CountingPipeline`]: always succeeds, counting each hook.
//! - [`FailingPipeline`]: fails a chosen hook after N successful calls.
//! - [`PanickingPipeline`]: panics in a chosen hook.
//! - [`SteeringPipeline`]: sets a steering value on every execute.
//! - [`ChannelWatcher`]: checks that a channel's producer was refreshed.
//!
//! All of them record `"<name> <phase>"` into a shared [`CallLog`].

use std::sync::{Arc, Mutex};

use insitu_core::Node;
use insitu_engine::pipeline::{Phase, Pipeline, PipelineContext};

/// Shared, ordered record of pipeline hook calls.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, pipeline: &str, phase: Phase) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{pipeline} {phase}"));
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Calls of `phase` on `pipeline`.
    pub fn count(&self, pipeline: &str, phase: Phase) -> usize {
        let wanted = format!("{pipeline} {phase}");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| **c == wanted)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

// ── CountingPipeline ───────────────────────────────────────────────

/// Succeeds in every hook. Remembers the last parameters and step.
pub struct CountingPipeline {
    pub name: String,
    log: CallLog,
    last: Arc<Mutex<Option<(i64, Vec<String>)>>>,
    parameters: Vec<String>,
}

impl CountingPipeline {
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            last: Arc::default(),
            parameters: Vec::new(),
        }
    }

    /// Handle to the last `(timestep, parameters)` seen by execute.
    pub fn last_step(&self) -> Arc<Mutex<Option<(i64, Vec<String>)>>> {
        Arc::clone(&self.last)
    }
}

impl Pipeline for CountingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.log.record(&self.name, Phase::Initialize);
        true
    }

    fn execute(&mut self, _ctx: &mut PipelineContext<'_>, timestep: i64, _time: f64) -> bool {
        self.log.record(&self.name, Phase::Execute);
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((timestep, self.parameters.clone()));
        true
    }

    fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.log.record(&self.name, Phase::Results);
        true
    }

    fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.log.record(&self.name, Phase::Finalize);
        true
    }

    fn set_parameters(&mut self, parameters: &[String]) {
        parameters.clone_into(&mut self.parameters);
    }
}

// ── FailingPipeline ────────────────────────────────────────────────

/// Fails `phase` once it has succeeded `after` times.
pub struct FailingPipeline {
    pub name: String,
    log: CallLog,
    phase: Phase,
    remaining: usize,
}

impl FailingPipeline {
    pub fn new(name: impl Into<String>, log: &CallLog, phase: Phase, after: usize) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            phase,
            remaining: after,
        }
    }

    fn outcome(&mut self, phase: Phase) -> bool {
        self.log.record(&self.name, phase);
        if phase != self.phase {
            return true;
        }
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

impl Pipeline for FailingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.outcome(Phase::Initialize)
    }

    fn execute(&mut self, _ctx: &mut PipelineContext<'_>, _timestep: i64, _time: f64) -> bool {
        self.outcome(Phase::Execute)
    }

    fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.outcome(Phase::Results)
    }

    fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.outcome(Phase::Finalize)
    }
}

// ── PanickingPipeline ──────────────────────────────────────────────

/// Panics in `phase`; succeeds elsewhere.
pub struct PanickingPipeline {
    pub name: String,
    log: CallLog,
    phase: Phase,
}

impl PanickingPipeline {
    pub fn new(name: impl Into<String>, log: &CallLog, phase: Phase) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            phase,
        }
    }

    fn enter(&self, phase: Phase) -> bool {
        self.log.record(&self.name, phase);
        if phase == self.phase {
            panic!("{} panicked in {phase}", self.name);
        }
        true
    }
}

impl Pipeline for PanickingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.enter(Phase::Initialize)
    }

    fn execute(&mut self, _ctx: &mut PipelineContext<'_>, _timestep: i64, _time: f64) -> bool {
        self.enter(Phase::Execute)
    }

    fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.enter(Phase::Results)
    }

    fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.enter(Phase::Finalize)
    }
}

// ── SteeringPipeline ───────────────────────────────────────────────

/// Sets `target/parameter` to the current timestep on every execute.
pub struct SteeringPipeline {
    pub name: String,
    target: String,
    parameter: String,
}

impl SteeringPipeline {
    pub fn new(name: impl Into<String>, target: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            parameter: parameter.into(),
        }
    }
}

impl Pipeline for SteeringPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, _time: f64) -> bool {
        ctx.steering_mut()
            .set(&self.target, &self.parameter, Node::Int(timestep));
        true
    }
}

// ── ChannelWatcher ───────────────────────────────────────────────────

/// Succeeds only when `channel` has a producer marked modified this step.
pub struct ChannelWatcher {
    pub name: String,
    channel: String,
    log: CallLog,
}

impl ChannelWatcher {
    pub fn new(name: impl Into<String>, channel: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            log: log.clone(),
        }
    }
}

impl Pipeline for ChannelWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.log.record(&self.name, Phase::Initialize);
        true
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, _timestep: i64, _time: f64) -> bool {
        self.log.record(&self.name, Phase::Execute);
        let refreshed = ctx.channels().iter().any(|c| *c == self.channel);
        refreshed
            && ctx
                .registry()
                .get_producer(&self.channel)
                .is_some_and(|p| p.is_modified())
    }
}
