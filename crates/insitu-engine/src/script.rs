//! Script pipelines: the boundary to the embedded script runtime.
//!
//! The runtime is a collaborator. A [`ScriptLoader`] turns a file into a
//! [`ScriptModule`] exposing the lifecycle hooks; [`ScriptPipeline`]
//! drives those hooks and keeps per-script timing. The built-in rhai
//! runtime lives in `scripting` behind the `scripting` feature.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use insitu_core::CollaboratorError;
use thiserror::Error;

use crate::pipeline::{Pipeline, PipelineContext};

/// Errors from loading a script or running one of its hooks.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// No script runtime is available.
    #[error(transparent)]
    Unavailable(#[from] CollaboratorError),
    /// The script could not be read or compiled.
    #[error("cannot load script '{}': {reason}", path.display())]
    Load {
        /// Script path.
        path: PathBuf,
        /// Reason given by the runtime.
        reason: String,
    },
    /// A hook raised an error.
    #[error("script hook '{hook}' failed: {reason}")]
    Hook {
        /// Hook name.
        hook: &'static str,
        /// Reason given by the runtime.
        reason: String,
    },
}

/// Step information handed to the activation and execute hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInfo<'a> {
    /// Current timestep.
    pub timestep: i64,
    /// Current simulation time.
    pub time: f64,
    /// Forwarded `state/parameters`.
    pub parameters: &'a [String],
    /// Channels refreshed this step.
    pub channels: &'a [String],
}

/// A loaded script.
///
/// Each hook returns `Ok(true)` on success and `Ok(false)` when the script
/// reports failure. Only [`execute`](Self::execute) is mandatory.
pub trait ScriptModule: Send {
    /// Called once with the configured `args`.
    fn initialize(&mut self, _args: &[String]) -> Result<bool, ScriptError> {
        Ok(true)
    }

    /// Activation predicate: execute only runs when this returns true.
    fn should_execute(&mut self, _step: &StepInfo<'_>) -> Result<bool, ScriptError> {
        Ok(true)
    }

    /// Process one step.
    fn execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError>;

    /// Post-process after a results request.
    fn results(&mut self) -> Result<bool, ScriptError> {
        Ok(true)
    }

    /// Release script resources.
    fn finalize(&mut self) -> Result<bool, ScriptError> {
        Ok(true)
    }
}

/// Loads script files into [`ScriptModule`]s.
pub trait ScriptLoader: Send + Sync {
    /// Load and import `path`, running its top-level code once.
    fn load(&self, path: &Path) -> Result<Box<dyn ScriptModule>, ScriptError>;
}

/// Per-script execution counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptTiming {
    /// Execute hook invocations.
    pub executions: u64,
    /// Steps where the activation predicate declined.
    pub skipped: u64,
    /// Time spent in the execute hook.
    pub execute_time: Duration,
}

/// Pipeline running a user script.
pub struct ScriptPipeline {
    name: String,
    filename: String,
    args: Vec<String>,
    parameters: Vec<String>,
    module: Option<Box<dyn ScriptModule>>,
    timing: ScriptTiming,
}

impl std::fmt::Debug for ScriptPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptPipeline")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("args", &self.args)
            .field("loaded", &self.module.is_some())
            .field("timing", &self.timing)
            .finish()
    }
}

impl ScriptPipeline {
    /// Pipeline `name` running the script at `filename`.
    pub fn new(name: impl Into<String>, filename: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            args,
            parameters: Vec::new(),
            module: None,
            timing: ScriptTiming::default(),
        }
    }

    /// Script file.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Arguments passed to the initialize hook.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Execution counters.
    pub fn timing(&self) -> ScriptTiming {
        self.timing
    }

    fn hook_result(&self, hook: &'static str, result: Result<bool, ScriptError>) -> bool {
        match result {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(pipeline = %self.name, hook, "script hook reported failure");
                false
            }
            Err(e) => {
                tracing::error!(pipeline = %self.name, hook, "{e}");
                false
            }
        }
    }
}

impl Pipeline for ScriptPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        let Some(loader) = ctx.script_loader() else {
            let e = CollaboratorError::unavailable("script runtime", "no script loader is installed");
            tracing::error!(pipeline = %self.name, script = %self.filename, "{e}");
            return false;
        };
        let mut module = match loader.load(Path::new(&self.filename)) {
            Ok(module) => module,
            Err(e) => {
                tracing::error!(pipeline = %self.name, "{e}");
                return false;
            }
        };
        let result = module.initialize(&self.args);
        self.module = Some(module);
        self.hook_result("initialize", result)
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, time: f64) -> bool {
        let Some(module) = self.module.as_mut() else {
            tracing::error!(pipeline = %self.name, "script executed before it was loaded");
            return false;
        };
        let info = StepInfo {
            timestep,
            time,
            parameters: &self.parameters,
            channels: ctx.channels(),
        };
        match module.should_execute(&info) {
            Ok(true) => {}
            Ok(false) => {
                self.timing.skipped += 1;
                tracing::trace!(pipeline = %self.name, timestep, "activation declined");
                return true;
            }
            Err(e) => {
                tracing::error!(pipeline = %self.name, "{e}");
                return false;
            }
        }
        let started = Instant::now();
        let result = module.execute(&info);
        self.timing.execute_time += started.elapsed();
        self.timing.executions += 1;
        self.hook_result("execute", result)
    }

    fn results(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        let Some(module) = self.module.as_mut() else {
            return false;
        };
        let result = module.results();
        self.hook_result("results", result)
    }

    fn finalize(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        let Some(mut module) = self.module.take() else {
            return true;
        };
        let result = module.finalize();
        let ok = self.hook_result("finalize", result);
        let config = ctx.config();
        if config.timing_summary && config.is_root() {
            tracing::info!(
                pipeline = %self.name,
                executions = self.timing.executions,
                skipped = self.timing.skipped,
                execute_ms = self.timing.execute_time.as_secs_f64() * 1e3,
                "script timing summary"
            );
        }
        ok
    }

    fn set_parameters(&mut self, parameters: &[String]) {
        parameters.clone_into(&mut self.parameters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::registry::Registry;
    use crate::steering::Steering;
    use insitu_core::StepStamp;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
    }

    struct Module {
        log: Arc<Mutex<Log>>,
        every: i64,
    }

    impl ScriptModule for Module {
        fn initialize(&mut self, args: &[String]) -> Result<bool, ScriptError> {
            self.log.lock().unwrap().calls.push(format!("init {}", args.join(",")));
            Ok(true)
        }

        fn should_execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
            Ok(step.timestep % self.every == 0)
        }

        fn execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
            self.log
                .lock()
                .unwrap()
                .calls
                .push(format!("exec {} {}", step.timestep, step.parameters.join(",")));
            Ok(true)
        }
    }

    struct Loader {
        log: Arc<Mutex<Log>>,
    }

    impl ScriptLoader for Loader {
        fn load(&self, _path: &Path) -> Result<Box<dyn ScriptModule>, ScriptError> {
            Ok(Box::new(Module {
                log: Arc::clone(&self.log),
                every: 2,
            }))
        }
    }

    struct Fixture {
        registry: Registry,
        steering: Steering,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Registry::new(),
                steering: Steering::new(),
                config: EngineConfig::default(),
            }
        }
    }

    #[test]
    fn without_loader_initialize_fails() {
        let mut f = Fixture::new();
        let mut ctx = PipelineContext::new(
            &mut f.registry,
            &mut f.steering,
            None,
            None,
            &f.config,
            &[],
            StepStamp::default(),
        );
        let mut p = ScriptPipeline::new("s", "s.rhai", Vec::new());
        assert!(!p.initialize(&mut ctx));
    }

    #[test]
    fn activation_predicate_gates_execute() {
        let log = Arc::new(Mutex::new(Log::default()));
        let loader = Loader { log: Arc::clone(&log) };
        let mut f = Fixture::new();
        let mut ctx = PipelineContext::new(
            &mut f.registry,
            &mut f.steering,
            None,
            Some(&loader),
            &f.config,
            &[],
            StepStamp::default(),
        );
        let mut p = ScriptPipeline::new("s", "s.rhai", vec!["a".into(), "b".into()]);
        assert!(p.initialize(&mut ctx));
        for ts in 0..4 {
            p.set_parameters(&[format!("p{ts}")]);
            assert!(p.execute(&mut ctx, ts, 0.0));
        }
        assert!(p.finalize(&mut ctx));

        let calls = log.lock().unwrap().calls.clone();
        assert_eq!(calls, ["init a,b", "exec 0 p0", "exec 2 p2"]);
        assert_eq!(p.timing().executions, 2);
        assert_eq!(p.timing().skipped, 2);
    }
}
