//! Built-in rhai script runtime.
//!
//! A script defines any of the hooks below as top-level functions. Only
//! `catalyst_execute` is required. Top-level statements run once when the
//! script is loaded. Hooks share a persistent object map bound as `this`,
//! so state set in one hook is visible in the next.
//!
//! | hook                      | arguments |
//! |---------------------------|-----------|
//! | `catalyst_initialize`     | `args` (array of strings) |
//! | `catalyst_should_execute` | `info` |
//! | `catalyst_execute`        | `info` |
//! | `catalyst_results`        | none |
//! | `catalyst_finalize`       | none |
//!
//! `info` is a map with `timestep`, `time`, `parameters` and `channels`.
//! A hook may declare fewer parameters than it is offered. Returning
//! `false` reports failure; any other value counts as success.
//!
//! ```rhai
//! fn catalyst_initialize(args) { this.count = 0; }
//! fn catalyst_should_execute(info) { info.timestep % 10 == 0 }
//! fn catalyst_execute(info) { this.count += 1; }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST};

use crate::script::{ScriptError, ScriptLoader, ScriptModule, StepInfo};

const INITIALIZE: &str = "catalyst_initialize";
const SHOULD_EXECUTE: &str = "catalyst_should_execute";
const EXECUTE: &str = "catalyst_execute";
const RESULTS: &str = "catalyst_results";
const FINALIZE: &str = "catalyst_finalize";

/// Resource limits applied to every script engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Operations allowed per hook call.
    pub max_operations: u64,
    /// Nested function call depth.
    pub max_call_levels: usize,
    /// Longest string a script may build.
    pub max_string_size: usize,
    /// Largest array a script may build.
    pub max_array_size: usize,
    /// Largest object map a script may build.
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 32,
            max_string_size: 1 << 20,
            max_array_size: 100_000,
            max_map_size: 10_000,
        }
    }
}

/// [`ScriptLoader`] backed by rhai.
#[derive(Clone, Copy, Debug, Default)]
pub struct RhaiLoader {
    limits: ScriptLimits,
}

impl RhaiLoader {
    /// Loader with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with explicit limits.
    pub fn with_limits(limits: ScriptLimits) -> Self {
        Self { limits }
    }
}

impl ScriptLoader for RhaiLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ScriptModule>, ScriptError> {
        Ok(Box::new(RhaiModule::from_file(path, self.limits)?))
    }
}

/// One loaded rhai script.
pub struct RhaiModule {
    name: String,
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    state: Dynamic,
    arity: HashMap<String, usize>,
}

impl std::fmt::Debug for RhaiModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiModule")
            .field("name", &self.name)
            .field("hooks", &self.arity)
            .finish_non_exhaustive()
    }
}

impl RhaiModule {
    /// Read, compile and import the script at `path`.
    pub fn from_file(path: &Path, limits: ScriptLimits) -> Result<Self, ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|e| load_error(path, e))?;
        let name = path.display().to_string();
        Self::compile(name, &source, limits).map_err(|reason| ScriptError::Load {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Compile and import `source`, naming it `name` in log output.
    pub fn from_source(name: &str, source: &str, limits: ScriptLimits) -> Result<Self, ScriptError> {
        Self::compile(name.to_string(), source, limits).map_err(|reason| ScriptError::Load {
            path: PathBuf::from(name),
            reason,
        })
    }

    fn compile(name: String, source: &str, limits: ScriptLimits) -> Result<Self, String> {
        let engine = build_engine(&name, limits);
        let ast = engine.compile(source).map_err(|e| e.to_string())?;

        let arity: HashMap<String, usize> = ast
            .iter_functions()
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();
        if !arity.contains_key(EXECUTE) {
            return Err(format!("script does not define '{EXECUTE}'"));
        }

        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| e.to_string())?;

        tracing::debug!(script = %name, hooks = arity.len(), "script loaded");
        Ok(Self {
            name,
            engine,
            ast,
            scope,
            state: Dynamic::from_map(rhai::Map::new()),
            arity,
        })
    }

    /// True if the script defines `hook`.
    pub fn has_hook(&self, hook: &str) -> bool {
        self.arity.contains_key(hook)
    }

    /// The persistent `this` map shared by all hooks.
    pub fn state(&self) -> &Dynamic {
        &self.state
    }

    /// Call `hook` if defined, passing as many of `args` as it declares.
    /// Undefined hooks succeed.
    fn call(&mut self, hook: &'static str, mut args: Vec<Dynamic>) -> Result<bool, ScriptError> {
        let Some(&arity) = self.arity.get(hook) else {
            return Ok(true);
        };
        args.truncate(arity);
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut self.state);
        let value = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &self.ast, hook, args)
            .map_err(|e| ScriptError::Hook {
                hook,
                reason: e.to_string(),
            })?;
        Ok(value.as_bool().unwrap_or(true))
    }
}

impl ScriptModule for RhaiModule {
    fn initialize(&mut self, args: &[String]) -> Result<bool, ScriptError> {
        self.call(INITIALIZE, vec![strings(args)])
    }

    fn should_execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
        self.call(SHOULD_EXECUTE, vec![info_map(step)])
    }

    fn execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
        self.call(EXECUTE, vec![info_map(step)])
    }

    fn results(&mut self) -> Result<bool, ScriptError> {
        self.call(RESULTS, Vec::new())
    }

    fn finalize(&mut self) -> Result<bool, ScriptError> {
        self.call(FINALIZE, Vec::new())
    }
}

fn build_engine(name: &str, limits: ScriptLimits) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_operations(limits.max_operations);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    let script = name.to_string();
    engine.on_print(move |text| tracing::info!(script = %script, "{text}"));
    let script = name.to_string();
    engine.on_debug(move |text, _source, pos| {
        tracing::debug!(script = %script, position = %pos, "{text}");
    });
    engine
}

fn load_error(path: &Path, e: std::io::Error) -> ScriptError {
    ScriptError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn strings(values: &[String]) -> Dynamic {
    Dynamic::from_array(values.iter().cloned().map(Dynamic::from).collect())
}

fn info_map(step: &StepInfo<'_>) -> Dynamic {
    let mut map = rhai::Map::new();
    map.insert("timestep".into(), Dynamic::from(step.timestep));
    map.insert("time".into(), Dynamic::from(step.time));
    map.insert("parameters".into(), strings(step.parameters));
    map.insert("channels".into(), strings(step.channels));
    Dynamic::from_map(map)
}
