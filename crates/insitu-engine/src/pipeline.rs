//! The [`Pipeline`] trait, its closed variant set, and per-pipeline
//! lifecycle tracking.
//!
//! Pipelines are stateful analysis units driven by the dispatcher through
//! four hooks. Only [`execute`](Pipeline::execute) is mandatory; the
//! other hooks default to success.
//!
//! [`PipelineSlot`] wraps a [`PipelineKind`] with its lifecycle state.
//! Failures are sticky: a pipeline whose initialize fails is never
//! executed, a pipeline whose execute fails is never executed again, and
//! a results failure suppresses later results calls. A panic inside a
//! hook is caught and counts as a failed hook.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use insitu_core::StepStamp;

use crate::config::EngineConfig;
use crate::io_pipeline::IoPipeline;
use crate::registry::Registry;
use crate::script::{ScriptLoader, ScriptPipeline};
use crate::steering::Steering;
use crate::writer::WriterFactory;

// ── PipelineContext ────────────────────────────────────────────────

/// Engine state a pipeline hook may use.
///
/// Built by the dispatcher for each hook call. For testing, construct
/// one directly with [`PipelineContext::new`].
pub struct PipelineContext<'a> {
    registry: &'a mut Registry,
    steering: &'a mut Steering,
    writers: Option<&'a dyn WriterFactory>,
    scripts: Option<&'a dyn ScriptLoader>,
    config: &'a EngineConfig,
    channels: &'a [String],
    stamp: StepStamp,
}

impl<'a> PipelineContext<'a> {
    /// Construct a context.
    pub fn new(
        registry: &'a mut Registry,
        steering: &'a mut Steering,
        writers: Option<&'a dyn WriterFactory>,
        scripts: Option<&'a dyn ScriptLoader>,
        config: &'a EngineConfig,
        channels: &'a [String],
        stamp: StepStamp,
    ) -> Self {
        Self {
            registry,
            steering,
            writers,
            scripts,
            config,
            channels,
            stamp,
        }
    }

    /// Channel/producer registry.
    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    /// Mutable channel/producer registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut *self.registry
    }

    /// Steering table; values set here are pushed at the next execute.
    pub fn steering_mut(&mut self) -> &mut Steering {
        &mut *self.steering
    }

    /// Mesh writer factory, if one is installed.
    pub fn writer_factory(&self) -> Option<&'a dyn WriterFactory> {
        self.writers
    }

    /// Script runtime, if one is installed.
    pub fn script_loader(&self) -> Option<&'a dyn ScriptLoader> {
        self.scripts
    }

    /// Engine configuration.
    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    /// Channels refreshed by the current execute call.
    pub fn channels(&self) -> &'a [String] {
        self.channels
    }

    /// Timestep and time of the current call.
    pub fn stamp(&self) -> StepStamp {
        self.stamp
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// A named, stateful unit of analysis work.
///
/// # Contract
///
/// - Hooks return `true` on success. A `false` return (or a panic) is a
///   sticky failure for that pipeline and phase.
/// - `initialize` runs lazily before the pipeline's first `execute`.
/// - `finalize` runs only if `initialize` succeeded.
/// - Names are not required to be unique.
///
/// # Examples
///
/// ```
/// use insitu_engine::pipeline::{Pipeline, PipelineContext};
///
/// struct StepCounter {
///     steps: u64,
/// }
///
/// impl Pipeline for StepCounter {
///     fn name(&self) -> &str {
///         "step_counter"
///     }
///
///     fn execute(&mut self, _ctx: &mut PipelineContext<'_>, _timestep: i64, _time: f64) -> bool {
///         self.steps += 1;
///         true
///     }
/// }
///
/// let counter = StepCounter { steps: 0 };
/// assert_eq!(counter.name(), "step_counter");
/// ```
pub trait Pipeline: Send {
    /// Name used in logs and for `state/pipelines` selection.
    fn name(&self) -> &str;

    /// Prepare for execution. Default: success.
    fn initialize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        true
    }

    /// Process one step.
    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, time: f64) -> bool;

    /// Post-process after the host's results request. Default: success.
    fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        true
    }

    /// Release resources. Default: success.
    fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        true
    }

    /// Receive the current call's `state/parameters`.
    fn set_parameters(&mut self, _parameters: &[String]) {}
}

/// The closed set of pipeline variants.
pub enum PipelineKind {
    /// Writes a channel to disk every step.
    Io(IoPipeline),
    /// Runs a user script.
    Script(ScriptPipeline),
    /// Host-built pipeline.
    Custom(Box<dyn Pipeline>),
}

impl PipelineKind {
    /// Wrap a host-built pipeline.
    pub fn custom(pipeline: impl Pipeline + 'static) -> Self {
        Self::Custom(Box::new(pipeline))
    }

    fn as_pipeline(&self) -> &dyn Pipeline {
        match self {
            Self::Io(p) => p,
            Self::Script(p) => p,
            Self::Custom(p) => p.as_ref(),
        }
    }

    fn as_pipeline_mut(&mut self) -> &mut dyn Pipeline {
        match self {
            Self::Io(p) => p,
            Self::Script(p) => p,
            Self::Custom(p) => p.as_mut(),
        }
    }

    /// Short variant label for logs.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Script(_) => "script",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineKind")
            .field("variant", &self.variant())
            .field("name", &self.name())
            .finish()
    }
}

impl Pipeline for PipelineKind {
    fn name(&self) -> &str {
        self.as_pipeline().name()
    }

    fn initialize(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        self.as_pipeline_mut().initialize(ctx)
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, time: f64) -> bool {
        self.as_pipeline_mut().execute(ctx, timestep, time)
    }

    fn results(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        self.as_pipeline_mut().results(ctx)
    }

    fn finalize(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        self.as_pipeline_mut().finalize(ctx)
    }

    fn set_parameters(&mut self, parameters: &[String]) {
        self.as_pipeline_mut().set_parameters(parameters);
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle state of one pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Not yet initialized.
    Uninitialized,
    /// Initialize succeeded; not yet executed.
    Initialized,
    /// Initialize failed. Sticky.
    InitFailed,
    /// At least one execute succeeded.
    Running,
    /// An execute failed. Sticky.
    ExecuteFailed,
    /// Finalize has run.
    Finalized,
}

impl PipelineState {
    /// True for the sticky failure states.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::InitFailed | Self::ExecuteFailed)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::InitFailed => "init-failed",
            Self::Running => "running",
            Self::ExecuteFailed => "execute-failed",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline hook, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// [`Pipeline::initialize`].
    Initialize,
    /// [`Pipeline::execute`].
    Execute,
    /// [`Pipeline::results`].
    Results,
    /// [`Pipeline::finalize`].
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initialize => "initialize",
            Self::Execute => "execute",
            Self::Results => "results",
            Self::Finalize => "finalize",
        })
    }
}

/// A pipeline plus its lifecycle state and sticky failure flags.
#[derive(Debug)]
pub struct PipelineSlot {
    kind: PipelineKind,
    state: PipelineState,
    results_failed: bool,
}

impl PipelineSlot {
    /// Wrap `kind` in the [`Uninitialized`](PipelineState::Uninitialized)
    /// state.
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            state: PipelineState::Uninitialized,
            results_failed: false,
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Wrapped pipeline.
    pub fn kind(&self) -> &PipelineKind {
        &self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// True once a results call has failed.
    pub fn results_failed(&self) -> bool {
        self.results_failed
    }

    /// True if initialize has run and succeeded.
    pub fn init_succeeded(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Initialized | PipelineState::Running | PipelineState::ExecuteFailed
        )
    }

    /// True if the pipeline can still be executed.
    pub fn executable(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Uninitialized | PipelineState::Initialized | PipelineState::Running
        )
    }

    /// Initialize if not done yet. Returns true if the pipeline is
    /// initialized afterwards.
    pub(crate) fn ensure_initialized(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        if self.state != PipelineState::Uninitialized {
            return self.init_succeeded();
        }
        let name = self.kind.name().to_string();
        let kind = &mut self.kind;
        let ok = guarded(&name, Phase::Initialize, || kind.initialize(ctx));
        self.state = if ok {
            PipelineState::Initialized
        } else {
            tracing::error!(pipeline = %name, "pipeline failed to initialize");
            PipelineState::InitFailed
        };
        ok
    }

    /// Forward parameters and run execute. The pipeline must be
    /// initialized and not failed.
    pub(crate) fn execute(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        stamp: StepStamp,
        parameters: Option<&[String]>,
    ) -> bool {
        debug_assert!(matches!(
            self.state,
            PipelineState::Initialized | PipelineState::Running
        ));
        let name = self.kind.name().to_string();
        let kind = &mut self.kind;
        let ok = guarded(&name, Phase::Execute, || {
            if let Some(parameters) = parameters {
                kind.set_parameters(parameters);
            }
            kind.execute(ctx, stamp.timestep, stamp.time)
        });
        self.state = if ok {
            PipelineState::Running
        } else {
            tracing::error!(
                pipeline = %name,
                timestep = stamp.timestep,
                "pipeline failed to execute"
            );
            PipelineState::ExecuteFailed
        };
        ok
    }

    /// Run results if the pipeline is eligible. Returns `None` when
    /// skipped.
    pub(crate) fn results(&mut self, ctx: &mut PipelineContext<'_>) -> Option<bool> {
        let eligible = matches!(
            self.state,
            PipelineState::Initialized | PipelineState::Running
        ) && !self.results_failed;
        if !eligible {
            return None;
        }
        let name = self.kind.name().to_string();
        let kind = &mut self.kind;
        let ok = guarded(&name, Phase::Results, || kind.results(ctx));
        if !ok {
            tracing::error!(pipeline = %name, "pipeline results failed");
            self.results_failed = true;
        }
        Some(ok)
    }

    /// Run finalize if initialize succeeded. Returns `None` when skipped.
    pub(crate) fn finalize(&mut self, ctx: &mut PipelineContext<'_>) -> Option<bool> {
        if !self.init_succeeded() {
            return None;
        }
        let name = self.kind.name().to_string();
        let kind = &mut self.kind;
        let ok = guarded(&name, Phase::Finalize, || kind.finalize(ctx));
        if !ok {
            tracing::warn!(pipeline = %name, "pipeline finalize reported failure");
        }
        self.state = PipelineState::Finalized;
        Some(ok)
    }
}

/// Run a hook, converting a panic into a failed hook.
pub(crate) fn guarded(name: &str, phase: Phase, hook: impl FnOnce() -> bool) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(ok) => ok,
        Err(payload) => {
            tracing::error!(
                pipeline = name,
                phase = %phase,
                panic = %panic_message(payload.as_ref()),
                "pipeline panicked"
            );
            false
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
