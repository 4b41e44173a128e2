//! Registry-side data source bound to one channel.

use insitu_blueprint::ChannelType;
use insitu_core::Node;

/// Materialized data for one channel.
///
/// A producer is created the first time its channel is seen and lives
/// until finalize. Adapters replace its payload each step and then call
/// [`mark_modified`](Self::mark_modified); consumers call
/// [`update`](Self::update) to materialize the latest content and read it
/// through [`output`](Self::output).
#[derive(Clone, Debug)]
pub struct Producer {
    channel: String,
    channel_type: ChannelType,
    payload: Node,
    field_data: Node,
    multimesh: bool,
    assembly: Option<Node>,
    output_multiblock: bool,
    amr: bool,
    modifications: u64,
    materialized_at: Option<u64>,
    no_prior_temporal_access: bool,
    steerable: bool,
    output: Option<Node>,
    output_time: Option<f64>,
}

impl Producer {
    /// An empty producer for `channel`.
    pub fn new(channel: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            channel: channel.into(),
            channel_type,
            payload: Node::object(),
            field_data: Node::object(),
            multimesh: channel_type.is_multi(),
            assembly: None,
            output_multiblock: false,
            amr: channel_type == ChannelType::Amrmesh,
            modifications: 0,
            materialized_at: None,
            no_prior_temporal_access: false,
            steerable: false,
            output: None,
            output_time: None,
        }
    }

    /// Channel this producer is bound to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) fn rename(&mut self, channel: &str) {
        channel.clone_into(&mut self.channel);
    }

    /// Channel type the producer was created for.
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Current input payload.
    pub fn payload(&self) -> &Node {
        &self.payload
    }

    /// Replace the input payload. Call [`mark_modified`](Self::mark_modified)
    /// afterwards.
    pub fn set_payload(&mut self, payload: Node) {
        self.payload = payload;
    }

    /// Auxiliary `time`/`timestep`/`cycle`/`channel`/`fields` node.
    pub fn field_data(&self) -> &Node {
        &self.field_data
    }

    /// Replace the auxiliary field data.
    pub fn set_field_data(&mut self, field_data: Node) {
        self.field_data = field_data;
    }

    /// True if the payload's children are separate meshes.
    pub fn is_multimesh(&self) -> bool {
        self.multimesh
    }

    /// Set the multi-mesh flag.
    pub fn set_multimesh(&mut self, multimesh: bool) {
        self.multimesh = multimesh;
    }

    /// Optional grouping of multi-mesh blocks.
    pub fn assembly(&self) -> Option<&Node> {
        self.assembly.as_ref()
    }

    /// Replace the assembly.
    pub fn set_assembly(&mut self, assembly: Option<Node>) {
        self.assembly = assembly;
    }

    /// True if a single mesh is presented as a one-block collection.
    pub fn output_multiblock(&self) -> bool {
        self.output_multiblock
    }

    /// Set the output-shape flag.
    pub fn set_output_multiblock(&mut self, multiblock: bool) {
        self.output_multiblock = multiblock;
    }

    /// True for adaptive mesh refinement payloads.
    pub fn is_amr(&self) -> bool {
        self.amr
    }

    /// Set the AMR flag.
    pub fn set_amr(&mut self, amr: bool) {
        self.amr = amr;
    }

    /// True once the data has been tagged step-at-a-time.
    ///
    /// In-situ data cannot be requested at an arbitrary earlier time.
    pub fn no_prior_temporal_access(&self) -> bool {
        self.no_prior_temporal_access
    }

    /// Tag the data as step-at-a-time.
    pub fn set_no_prior_temporal_access(&mut self, flag: bool) {
        self.no_prior_temporal_access = flag;
    }

    /// True if `results` writes this producer's output back to the host.
    pub fn is_steerable(&self) -> bool {
        self.steerable
    }

    pub(crate) fn set_steerable(&mut self, steerable: bool) {
        self.steerable = steerable;
    }

    /// Record that the payload changed.
    pub fn mark_modified(&mut self) {
        self.modifications += 1;
    }

    /// Number of times [`mark_modified`](Self::mark_modified) was called.
    pub fn modification_count(&self) -> u64 {
        self.modifications
    }

    /// True if the payload changed since the last [`update`](Self::update),
    /// or was never materialized.
    pub fn is_modified(&self) -> bool {
        self.materialized_at != Some(self.modifications)
    }

    /// Materialize the output if the payload changed. Returns true if it
    /// did.
    pub fn update(&mut self, time: f64) -> bool {
        if !self.is_modified() {
            return false;
        }
        let content = if self.output_multiblock && !self.multimesh {
            let mut wrapped = Node::object();
            wrapped.insert(self.channel.clone(), self.payload.clone());
            wrapped
        } else {
            self.payload.clone()
        };
        self.output = Some(content);
        self.output_time = Some(time);
        self.materialized_at = Some(self.modifications);
        true
    }

    /// Last materialized content, if any.
    pub fn output(&self) -> Option<&Node> {
        self.output.as_ref()
    }

    /// Time the current output was materialized at.
    pub fn output_time(&self) -> Option<f64> {
        self.output_time
    }
}
