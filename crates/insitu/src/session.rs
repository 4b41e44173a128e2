//! The protocol entry points.
//!
//! A [`Session`] is a cheap, cloneable handle to one [`Dispatcher`]. Each
//! entry point takes the full envelope (the node holding `catalyst`),
//! converts every failure into a [`Status`], and catches panics so they
//! never unwind into the host.
//!
//! Reentrancy: a pipeline may hold a clone of the session. Calling back
//! into it while `execute` or `results` is running is rejected with
//! [`Status::GenericError`] before the dispatcher lock is touched, so it
//! cannot deadlock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use insitu_core::{LifecycleError, Node};
use insitu_engine::pipeline::panic_message;
use insitu_engine::{
    Collaborators, ConfigError, DispatchError, Dispatcher, EngineConfig, Lifecycle, PipelineKind,
};

use crate::status::Status;

/// Value of `catalyst/implementation` written by [`Session::about`].
pub const IMPLEMENTATION: &str = "insitu";

// ── Activity marker ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Activity {
    Idle = 0,
    Executing = 1,
    Results = 2,
    Busy = 3,
}

impl Activity {
    fn load(marker: &AtomicU8) -> Self {
        match marker.load(Ordering::Acquire) {
            1 => Self::Executing,
            2 => Self::Results,
            3 => Self::Busy,
            _ => Self::Idle,
        }
    }
}

/// Resets the marker when a call ends, panics included.
struct ActivityGuard<'a>(&'a AtomicU8);

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.0.store(Activity::Idle as u8, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Capabilities {
    scripting: bool,
    fides: bool,
    rank: u32,
}

// ── Session ──────────────────────────────────────────────────────────

/// Handle to one co-processing runtime.
///
/// Clones share the same dispatcher. All state is owned by the session;
/// there is no process-global instance.
#[derive(Clone)]
pub struct Session {
    dispatcher: Arc<Mutex<Dispatcher>>,
    activity: Arc<AtomicU8>,
    capabilities: Capabilities,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("activity", &Activity::load(&self.activity))
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session with the default configuration and collaborators.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Session configured from the `INSITU_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_config(EngineConfig::from_env()?))
    }

    /// Session with `config` and the default collaborators.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_collaborators(config, Collaborators::default())
    }

    /// Session with an explicit collaborator set.
    pub fn with_collaborators(config: EngineConfig, collaborators: Collaborators) -> Self {
        let capabilities = Capabilities {
            scripting: collaborators.scripting_available(),
            fides: collaborators.fides_available(),
            rank: config.rank,
        };
        Self {
            dispatcher: Arc::new(Mutex::new(Dispatcher::with_collaborators(config, collaborators))),
            activity: Arc::new(AtomicU8::new(Activity::Idle as u8)),
            capabilities,
        }
    }

    // ── Entry points ─────────────────────────────────────────────────

    /// Initialize from `node/catalyst`. A missing `catalyst` initializes
    /// with an empty configuration.
    pub fn initialize(&self, node: &Node) -> Status {
        let null = Node::Null;
        let catalyst = node.child("catalyst").unwrap_or(&null);
        self.call("initialize", Activity::Busy, |d| status(d.initialize(catalyst)))
    }

    /// Process one step from `node/catalyst`.
    ///
    /// Returns [`Status::GenericError`] when the step reports failed
    /// pipelines. A missing `catalyst` is a no-op once initialized.
    pub fn execute(&self, node: &mut Node) -> Status {
        self.call("execute", Activity::Executing, |d| {
            let Some(catalyst) = node.child_mut("catalyst") else {
                return no_op(d, "execute");
            };
            match d.execute(catalyst) {
                Ok(report) if report.failed => Status::GenericError,
                Ok(_) => Status::Ok,
                Err(e) => failure(&e),
            }
        })
    }

    /// Run the results pass, writing steerable output under
    /// `node/catalyst/steerable`. A missing `catalyst` is a no-op once
    /// initialized.
    pub fn results(&self, node: &mut Node) -> Status {
        self.call("results", Activity::Results, |d| {
            let Some(catalyst) = node.child_mut("catalyst") else {
                return no_op(d, "results");
            };
            status(d.results(catalyst))
        })
    }

    /// Tear down. The envelope's content is ignored.
    pub fn finalize(&self, _node: &Node) -> Status {
        self.call("finalize", Activity::Busy, |d| status(d.finalize()))
    }

    /// Describe this implementation under `node/catalyst`.
    ///
    /// Query only: never touches the dispatcher, so it is safe from inside
    /// a running pipeline.
    pub fn about(&self, node: &mut Node) -> Status {
        let caps = self.capabilities;
        node.set_path("catalyst/implementation", IMPLEMENTATION);
        node.set_path("catalyst/version", env!("CARGO_PKG_VERSION"));
        node.set_path("catalyst/capabilities/scripting", caps.scripting);
        node.set_path("catalyst/capabilities/fides", caps.fides);
        node.set_path("catalyst/rank", i64::from(caps.rank));
        Status::Ok
    }

    // ── Host extensions ──────────────────────────────────────────────

    /// Add a host-built pipeline after initialize.
    pub fn register_pipeline(&self, kind: PipelineKind) -> Status {
        self.call("register_pipeline", Activity::Busy, |d| {
            status(d.register_pipeline(kind))
        })
    }

    /// Materialize every producer at `time`.
    pub fn update_all(&self, time: f64) -> Result<usize, Status> {
        self.enter("update_all", Activity::Busy, |d| {
            d.update_all(time).map_err(|e| failure(&e))
        })?
    }

    /// Block until an external steering client changes something.
    pub fn wait_for_external_change(&self) -> Result<bool, Status> {
        self.enter("wait_for_external_change", Activity::Busy, Dispatcher::wait_for_external_change)
    }

    /// Run `f` with exclusive access to the dispatcher.
    ///
    /// Rejected like any other call while `execute` or `results` is
    /// running.
    pub fn with_dispatcher<R>(&self, f: impl FnOnce(&mut Dispatcher) -> R) -> Result<R, Status> {
        self.enter("with_dispatcher", Activity::Busy, f)
    }

    /// True once `initialize` succeeded and until `finalize`.
    ///
    /// Rejected with [`Status::GenericError`] while another call is
    /// running.
    pub fn is_initialized(&self) -> Result<bool, Status> {
        self.with_dispatcher(|d| d.lifecycle() == Lifecycle::Initialized)
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    fn call(&self, entry: &'static str, activity: Activity, f: impl FnOnce(&mut Dispatcher) -> Status) -> Status {
        self.enter(entry, activity, f).unwrap_or_else(|s| s)
    }

    /// Reject reentry, lock, mark `activity`, and run `f` with panics
    /// caught.
    fn enter<R>(
        &self,
        entry: &'static str,
        activity: Activity,
        f: impl FnOnce(&mut Dispatcher) -> R,
    ) -> Result<R, Status> {
        let current = Activity::load(&self.activity);
        if current != Activity::Idle {
            match reentry_error(current, activity) {
                Some(e) => tracing::error!(entry, "{e}"),
                None => tracing::error!(entry, active = ?current, "call rejected: another call is in progress"),
            }
            return Err(Status::GenericError);
        }

        let mut dispatcher = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        self.activity.store(activity as u8, Ordering::Release);
        let _guard = ActivityGuard(&self.activity);
        panic::catch_unwind(AssertUnwindSafe(|| f(&mut *dispatcher))).map_err(|payload| {
            tracing::error!(
                entry,
                panic = %panic_message(payload.as_ref()),
                "panic caught at entry point"
            );
            Status::Panicked
        })
    }
}

fn reentry_error(current: Activity, requested: Activity) -> Option<LifecycleError> {
    match (current, requested) {
        (Activity::Executing, Activity::Executing) => Some(LifecycleError::ReentrantExecute),
        (Activity::Executing, Activity::Results) => Some(LifecycleError::ResultsDuringExecute),
        (Activity::Results, Activity::Results) => Some(LifecycleError::ReentrantResults),
        _ => None,
    }
}

fn status(result: Result<(), DispatchError>) -> Status {
    match result {
        Ok(()) => Status::Ok,
        Err(e) => failure(&e),
    }
}

fn failure(e: &DispatchError) -> Status {
    let status = Status::from(e);
    tracing::debug!(%status, "entry point failed: {e}");
    status
}

fn no_op(d: &Dispatcher, entry: &'static str) -> Status {
    match d.lifecycle() {
        Lifecycle::Initialized => {
            tracing::debug!(entry, "no catalyst node; nothing to do");
            Status::Ok
        }
        Lifecycle::Uninitialized => failure(&LifecycleError::NotInitialized.into()),
        Lifecycle::Finalized => failure(&LifecycleError::Finalized.into()),
    }
}
