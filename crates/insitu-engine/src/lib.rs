//! Orchestration engine for the insitu co-processing runtime.
//!
//! Provides the [`Dispatcher`] that drives the process-level lifecycle,
//! the channel/producer [`Registry`], the channel adapters, the
//! [`Pipeline`] contract with its IO, script and custom variants,
//! filename templates, steering, and configuration.
//!
//! Everything outside orchestration (mesh codecs, the script runtime,
//! step-stream readers, proxy loading, steering transport) is reached
//! through the traits collected in [`Collaborators`]. The built-in rhai
//! script runtime is enabled by the default `scripting` feature.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod io_pipeline;
pub mod pipeline;
pub mod producer;
pub mod registry;
pub mod report;
pub mod script;
#[cfg(feature = "scripting")]
pub mod scripting;
pub mod steering;
pub mod template;
pub mod writer;

pub use channel::{ChannelKind, SourceError, StepSource, StepSourceFactory};
pub use collaborators::{Collaborators, ProxyLoader};
pub use config::{ConfigError, EngineConfig, FailureReporting, InitConfig};
pub use dispatcher::{DispatchError, Dispatcher, Lifecycle};
pub use io_pipeline::IoPipeline;
pub use pipeline::{Pipeline, PipelineContext, PipelineKind, PipelineSlot, PipelineState};
pub use producer::Producer;
pub use registry::Registry;
pub use report::{ExecuteReport, SkippedChannel};
pub use script::{ScriptError, ScriptLoader, ScriptModule, ScriptPipeline, StepInfo};
#[cfg(feature = "scripting")]
pub use scripting::{RhaiLoader, RhaiModule, ScriptLimits};
pub use steering::{ExternalChangeWaiter, MeshInitializer, Steering};
pub use template::{TemplateArgs, TemplateError};
pub use writer::{JsonWriterFactory, MeshWriter, WriterError, WriterFactory};
