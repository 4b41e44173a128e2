//! Test utilities and mock collaborators for insitu development.
//!
//! - [`fixtures`]: pipelines with scripted outcomes that record every
//!   hook call into a shared [`CallLog`](fixtures::CallLog).
//! - [`envelopes`]: valid and invalid protocol envelopes.
//! - This module: in-memory implementations of the collaborator traits
//!   ([`WriterFactory`], [`StepSourceFactory`], [`MeshInitializer`],
//!   [`ProxyLoader`], [`ExternalChangeWaiter`], [`ScriptLoader`]).
//!
//! Every mock shares its recorded state through an `Arc`, so a test keeps
//! a clone of the mock and inspects it after handing the original to the
//! dispatcher.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod envelopes;
pub mod fixtures;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use insitu_core::{CollaboratorError, Node};
use insitu_engine::channel::{SourceError, StepSource, StepSourceFactory};
use insitu_engine::collaborators::ProxyLoader;
use insitu_engine::producer::Producer;
use insitu_engine::registry::Registry;
use insitu_engine::script::{ScriptError, ScriptLoader, ScriptModule, StepInfo};
use insitu_engine::steering::{ExternalChangeWaiter, MeshInitializer};
use insitu_engine::writer::{MeshWriter, WriterError, WriterFactory};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Writers ────────────────────────────────────────────────────────

/// One write captured by [`RecordingWriterFactory`].
#[derive(Clone, Debug, PartialEq)]
pub struct WrittenFile {
    pub channel: String,
    pub path: PathBuf,
    pub time: f64,
    pub output: Option<Node>,
}

/// Writer factory that keeps writes in memory instead of touching disk.
#[derive(Clone, Default)]
pub struct RecordingWriterFactory {
    writes: Arc<Mutex<Vec<WrittenFile>>>,
}

impl RecordingWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes so far, in order.
    pub fn writes(&self) -> Vec<WrittenFile> {
        lock(&self.writes).clone()
    }

    /// Paths written so far, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.writes).iter().map(|w| w.path.clone()).collect()
    }
}

impl WriterFactory for RecordingWriterFactory {
    fn create(&self, channel: &str) -> Result<Box<dyn MeshWriter>, WriterError> {
        Ok(Box::new(RecordingWriter {
            channel: channel.to_string(),
            writes: Arc::clone(&self.writes),
        }))
    }
}

struct RecordingWriter {
    channel: String,
    writes: Arc<Mutex<Vec<WrittenFile>>>,
}

impl MeshWriter for RecordingWriter {
    fn write(&mut self, path: &Path, producer: &Producer, time: f64) -> Result<(), WriterError> {
        lock(&self.writes).push(WrittenFile {
            channel: self.channel.clone(),
            path: path.to_path_buf(),
            time,
            output: producer.output().cloned(),
        });
        Ok(())
    }
}

// ── Step sources ───────────────────────────────────────────────────

/// Step source factory yielding a fixed sequence of `(time, mesh)` steps.
#[derive(Clone, Default)]
pub struct MockStepSources {
    steps: Arc<Mutex<VecDeque<(f64, Node)>>>,
    opened: Arc<AtomicUsize>,
}

impl MockStepSources {
    pub fn new(steps: impl IntoIterator<Item = (f64, Node)>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sources opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl StepSourceFactory for MockStepSources {
    fn open(&self, channel: &str, _config: &Node) -> Result<Box<dyn StepSource>, SourceError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStepSource {
            channel: channel.to_string(),
            steps: Arc::clone(&self.steps),
            current: None,
        }))
    }
}

struct MockStepSource {
    channel: String,
    steps: Arc<Mutex<VecDeque<(f64, Node)>>>,
    current: Option<Node>,
}

impl StepSource for MockStepSource {
    fn advance(&mut self) -> Result<f64, SourceError> {
        let (time, mesh) = lock(&self.steps)
            .pop_front()
            .ok_or_else(|| SourceError::Read {
                channel: self.channel.clone(),
                reason: "no more steps".into(),
            })?;
        self.current = Some(mesh);
        Ok(time)
    }

    fn read_mesh(&mut self) -> Result<Node, SourceError> {
        self.current.take().ok_or_else(|| SourceError::Read {
            channel: self.channel.clone(),
            reason: "advance was not called".into(),
        })
    }
}

// ── Steering ───────────────────────────────────────────────────────

/// Mesh initializer recording every push.
#[derive(Clone)]
pub struct RecordingInitializer {
    pushes: Arc<Mutex<Vec<(String, Node)>>>,
    accept: bool,
}

impl RecordingInitializer {
    /// Initializer accepting every push.
    pub fn new() -> Self {
        Self {
            pushes: Arc::default(),
            accept: true,
        }
    }

    /// Initializer rejecting every push.
    pub fn rejecting() -> Self {
        Self {
            accept: false,
            ..Self::new()
        }
    }

    /// `(target, values)` of every push, in order.
    pub fn pushes(&self) -> Vec<(String, Node)> {
        lock(&self.pushes).clone()
    }
}

impl Default for RecordingInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshInitializer for RecordingInitializer {
    fn push(&mut self, target: &str, values: &Node, _registry: &mut Registry) -> bool {
        lock(&self.pushes).push((target.to_string(), values.clone()));
        self.accept
    }
}

/// Change waiter answering from a fixed script, then `false`.
#[derive(Clone, Default)]
pub struct ScriptedWaiter {
    answers: Arc<Mutex<VecDeque<bool>>>,
}

impl ScriptedWaiter {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
        }
    }
}

impl ExternalChangeWaiter for ScriptedWaiter {
    fn wait_for_external_change(&mut self) -> bool {
        lock(&self.answers).pop_front().unwrap_or(false)
    }
}

// ── Proxies ────────────────────────────────────────────────────────

/// Proxy loader recording filenames; names containing `missing` fail.
#[derive(Clone, Default)]
pub struct RecordingProxyLoader {
    loaded: Arc<Mutex<Vec<String>>>,
}

impl RecordingProxyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filenames successfully loaded.
    pub fn loaded(&self) -> Vec<String> {
        lock(&self.loaded).clone()
    }
}

impl ProxyLoader for RecordingProxyLoader {
    fn load(&mut self, filename: &str) -> Result<(), CollaboratorError> {
        if filename.contains("missing") {
            return Err(CollaboratorError::unavailable(
                "proxy loader",
                format!("no such proxy file '{filename}'"),
            ));
        }
        lock(&self.loaded).push(filename.to_string());
        Ok(())
    }
}

// ── Scripts ────────────────────────────────────────────────────────

/// Script loader that needs no script files: every path loads a module
/// recording its hook calls as `"<file stem> <hook>"`.
///
/// Paths whose stem is `broken` fail to load; a stem starting with
/// `every_<n>` only activates on timesteps divisible by `n`.
#[derive(Clone, Default)]
pub struct MockScriptLoader {
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook calls across all loaded modules, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl ScriptLoader for MockScriptLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ScriptModule>, ScriptError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem == "broken" {
            return Err(ScriptError::Load {
                path: path.to_path_buf(),
                reason: "syntax error".into(),
            });
        }
        let every = stem
            .strip_prefix("every_")
            .and_then(|n| n.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Ok(Box::new(MockScript {
            stem,
            every,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MockScript {
    stem: String,
    every: i64,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockScript {
    fn record(&self, what: String) {
        lock(&self.calls).push(format!("{} {what}", self.stem));
    }
}

impl ScriptModule for MockScript {
    fn initialize(&mut self, args: &[String]) -> Result<bool, ScriptError> {
        self.record(format!("initialize {}", args.join(",")).trim_end().to_string());
        Ok(true)
    }

    fn should_execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
        Ok(step.timestep % self.every == 0)
    }

    fn execute(&mut self, step: &StepInfo<'_>) -> Result<bool, ScriptError> {
        self.record(format!("execute {}", step.timestep));
        Ok(true)
    }

    fn results(&mut self) -> Result<bool, ScriptError> {
        self.record("results".into());
        Ok(true)
    }

    fn finalize(&mut self) -> Result<bool, ScriptError> {
        self.record("finalize".into());
        Ok(true)
    }
}
