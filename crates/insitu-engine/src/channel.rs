//! Channel adapters: turn a channel's `data` node into producer content.
//!
//! An adapter is created the first time a channel is seen and kept for
//! the dispatcher's lifetime. [`ChannelKind`] is the closed set of
//! adapters; each implements [`ChannelAdapter`].
//!
//! - [`MeshAdapter`] ingests `mesh`, `multimesh` and `amrmesh` payloads.
//! - [`IossAdapter`] is configured from the first `data` node and then
//!   uses each step's in-memory payload.
//! - [`FidesAdapter`] reads steps from a [`StepSource`] and reports each
//!   step's time back into the envelope.

use insitu_blueprint::ChannelType;
use insitu_core::{CollaboratorError, Node, RegistryError, StepStamp};
use thiserror::Error;

use crate::producer::Producer;
use crate::registry::Registry;

// ── Errors ─────────────────────────────────────────────────────────

/// Errors from creating an adapter or ingesting a step.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The collaborator backing this channel type is not available.
    #[error(transparent)]
    Unavailable(#[from] CollaboratorError),
    /// The step source could not be opened.
    #[error("cannot open step source for '{channel}': {reason}")]
    Open {
        /// Channel name.
        channel: String,
        /// Reason given by the source.
        reason: String,
    },
    /// The next step could not be read.
    #[error("cannot read next step for '{channel}': {reason}")]
    Read {
        /// Channel name.
        channel: String,
        /// Reason given by the source.
        reason: String,
    },
    /// The producer could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ── Step sources ───────────────────────────────────────────────────

/// A reader that yields one mesh per on-disk step.
pub trait StepSource: Send {
    /// Advance to the next step and return its time.
    fn advance(&mut self) -> Result<f64, SourceError>;

    /// Mesh of the current step.
    fn read_mesh(&mut self) -> Result<Node, SourceError>;
}

/// Opens [`StepSource`]s for `fides` channels.
pub trait StepSourceFactory: Send + Sync {
    /// Open a source for `channel`, configured from its first `data` node.
    fn open(&self, channel: &str, config: &Node) -> Result<Box<dyn StepSource>, SourceError>;
}

// ── Adapter contract ───────────────────────────────────────────────

/// One channel's input for the current step.
#[derive(Debug)]
pub struct ChannelInput<'a> {
    /// Channel name.
    pub name: &'a str,
    /// The channel subtree of the envelope (`catalyst/channels/<name>`).
    /// Adapters may write outputs into it.
    pub node: &'a mut Node,
    /// Step stamp after the channel's own state overrides.
    pub stamp: StepStamp,
    /// Effective multiblock flag.
    pub multiblock: bool,
}

/// Moves one step of channel data into the registry.
pub trait ChannelAdapter {
    /// Channel type this adapter serves.
    fn channel_type(&self) -> ChannelType;

    /// Ingest the step: refresh the channel's producer, creating it on
    /// first use, and mark it modified.
    fn ingest(&mut self, input: ChannelInput<'_>, registry: &mut Registry) -> Result<(), SourceError>;
}

/// The closed set of channel adapters.
pub enum ChannelKind {
    /// `mesh`, `multimesh`, `amrmesh`.
    Mesh(MeshAdapter),
    /// `ioss`.
    Ioss(IossAdapter),
    /// `fides`.
    Fides(FidesAdapter),
}

impl std::fmt::Debug for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChannelKind").field(&self.channel_type()).finish()
    }
}

impl ChannelKind {
    /// Create the adapter for a channel seen for the first time.
    ///
    /// `fides` channels need a [`StepSourceFactory`]; without one the
    /// channel cannot be served.
    pub fn create(
        name: &str,
        channel_type: ChannelType,
        data: &Node,
        sources: Option<&dyn StepSourceFactory>,
    ) -> Result<Self, SourceError> {
        Ok(match channel_type {
            ChannelType::Mesh | ChannelType::Multimesh | ChannelType::Amrmesh => {
                Self::Mesh(MeshAdapter { channel_type })
            }
            ChannelType::Ioss => Self::Ioss(IossAdapter {
                configuration: data.clone(),
                steps: 0,
            }),
            ChannelType::Fides => {
                let factory = sources.ok_or_else(|| {
                    CollaboratorError::unavailable(
                        "fides step source",
                        "no step source factory is installed",
                    )
                })?;
                let source = factory.open(name, data)?;
                Self::Fides(FidesAdapter { source, steps: 0 })
            }
        })
    }

    fn as_adapter_mut(&mut self) -> &mut dyn ChannelAdapter {
        match self {
            Self::Mesh(a) => a,
            Self::Ioss(a) => a,
            Self::Fides(a) => a,
        }
    }
}

impl ChannelAdapter for ChannelKind {
    fn channel_type(&self) -> ChannelType {
        match self {
            Self::Mesh(a) => a.channel_type(),
            Self::Ioss(a) => a.channel_type(),
            Self::Fides(a) => a.channel_type(),
        }
    }

    fn ingest(&mut self, input: ChannelInput<'_>, registry: &mut Registry) -> Result<(), SourceError> {
        self.as_adapter_mut().ingest(input, registry)
    }
}

// ── Adapters ───────────────────────────────────────────────────────

/// Generic mesh ingestion.
#[derive(Debug)]
pub struct MeshAdapter {
    channel_type: ChannelType,
}

impl ChannelAdapter for MeshAdapter {
    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn ingest(&mut self, input: ChannelInput<'_>, registry: &mut Registry) -> Result<(), SourceError> {
        let payload = input.node.child("data").cloned().unwrap_or_else(Node::object);
        let assembly = input.node.child("assembly").cloned();
        let field_data = field_data(&input, input.stamp.time);
        let producer = producer_for(registry, input.name, self.channel_type)?;
        producer.set_payload(payload);
        producer.set_multimesh(self.channel_type.is_multi());
        producer.set_amr(self.channel_type == ChannelType::Amrmesh);
        producer.set_assembly(assembly);
        producer.set_output_multiblock(input.multiblock);
        finish(producer, field_data);
        Ok(())
    }
}

/// IOSS database ingestion.
#[derive(Debug)]
pub struct IossAdapter {
    configuration: Node,
    steps: u64,
}

impl IossAdapter {
    /// The `data` node the adapter was configured from.
    pub fn configuration(&self) -> &Node {
        &self.configuration
    }

    /// Steps ingested so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl ChannelAdapter for IossAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Ioss
    }

    fn ingest(&mut self, input: ChannelInput<'_>, registry: &mut Registry) -> Result<(), SourceError> {
        let payload = input.node.child("data").cloned().unwrap_or_else(Node::object);
        let field_data = field_data(&input, input.stamp.time);
        let producer = producer_for(registry, input.name, ChannelType::Ioss)?;
        producer.set_payload(payload);
        producer.set_output_multiblock(input.multiblock);
        finish(producer, field_data);
        self.steps += 1;
        Ok(())
    }
}

/// Fides step-stream ingestion.
pub struct FidesAdapter {
    source: Box<dyn StepSource>,
    steps: u64,
}

impl std::fmt::Debug for FidesAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FidesAdapter")
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl FidesAdapter {
    /// Steps read so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl ChannelAdapter for FidesAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Fides
    }

    fn ingest(&mut self, input: ChannelInput<'_>, registry: &mut Registry) -> Result<(), SourceError> {
        let time = self.source.advance()?;
        let mesh = self.source.read_mesh()?;
        input.node.set_path("state/time", time);
        let field_data = field_data(&input, time);
        let producer = producer_for(registry, input.name, ChannelType::Fides)?;
        producer.set_payload(mesh);
        producer.set_output_multiblock(input.multiblock);
        finish(producer, field_data);
        self.steps += 1;
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn producer_for<'r>(
    registry: &'r mut Registry,
    name: &str,
    channel_type: ChannelType,
) -> Result<&'r mut Producer, SourceError> {
    if !registry.contains(name) {
        registry.set_producer(name, Producer::new(name, channel_type))?;
    }
    registry.get_producer_mut(name).ok_or_else(|| {
        SourceError::Registry(RegistryError::UnknownChannel {
            channel: name.to_string(),
        })
    })
}

fn field_data(input: &ChannelInput<'_>, time: f64) -> Node {
    let mut node = Node::object();
    node.insert("time", time);
    node.insert("timestep", input.stamp.timestep);
    node.insert("cycle", input.stamp.cycle);
    node.insert("channel", input.name);
    if let Some(fields) = input.node.get_path("state/fields") {
        node.insert("fields", fields.clone());
    }
    node
}

fn finish(producer: &mut Producer, field_data: Node) {
    producer.set_field_data(field_data);
    producer.mark_modified();
    producer.set_no_prior_temporal_access(true);
}
