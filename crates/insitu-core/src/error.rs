//! Error types shared across the insitu workspace.
//!
//! Organized by failure class: schema rejections, lifecycle misuse,
//! producer registry conflicts, and unavailable collaborators. None of
//! these ever escape to the host as a panic; entry points map them to
//! status codes.

use thiserror::Error;

/// A node failed structural validation.
///
/// `path` is the offending location relative to the validated root, so
/// logs point at the exact leaf that was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct SchemaError {
    /// Offending path (`/`-separated).
    pub path: String,
    /// Human-readable description of the violation.
    pub reason: String,
}

impl SchemaError {
    /// Create a schema error at `path`.
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// An operation was invoked out of lifecycle order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The runtime has not been initialized yet.
    #[error("runtime is not initialized")]
    NotInitialized,
    /// The runtime was already finalized; its state has been released.
    #[error("runtime has already been finalized")]
    Finalized,
    /// `execute` was entered while another `execute` is in progress.
    #[error("execute is already in progress")]
    ReentrantExecute,
    /// `results` was entered while another `results` is in progress.
    #[error("results is already in progress")]
    ReentrantResults,
    /// `results` was entered while `execute` is in progress.
    #[error("results called while execute is in progress")]
    ResultsDuringExecute,
}

/// Errors from the channel/producer registry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Channel names must be non-empty.
    #[error("channel name must not be empty")]
    EmptyChannel,
    /// The channel already has a producer; producers are never rebound.
    #[error("channel '{channel}' already has a producer")]
    ProducerConflict {
        /// The contested channel.
        channel: String,
    },
    /// No producer is registered for the channel.
    #[error("no producer registered for channel '{channel}'")]
    UnknownChannel {
        /// The requested channel.
        channel: String,
    },
}

/// An optional collaborator (codec, reader, script runtime) is not
/// available in this build or was not provided by the host.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{collaborator} unavailable: {reason}")]
pub struct CollaboratorError {
    /// Which collaborator was requested.
    pub collaborator: &'static str,
    /// Why the request could not be served.
    pub reason: String,
}

impl CollaboratorError {
    /// Create an unavailability error for `collaborator`.
    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self {
            collaborator,
            reason: reason.into(),
        }
    }
}
