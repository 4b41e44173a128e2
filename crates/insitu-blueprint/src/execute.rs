//! The `execute` protocol schema and per-channel checks.

use std::fmt;
use std::str::FromStr;

use insitu_core::path::join;
use insitu_core::{Node, SchemaError};

use crate::check::{self, Check};
use crate::mesh::MeshSchema;
use crate::protocol::UnknownName;

/// Supported channel payload types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// A single conduit-style mesh.
    Mesh,
    /// A collection of meshes, optionally grouped by an assembly.
    Multimesh,
    /// Adaptive mesh refinement levels, checked like `Multimesh`.
    Amrmesh,
    /// IOSS database payload, checked by its adapter.
    Ioss,
    /// Fides/ADIOS step stream, checked by its adapter.
    Fides,
}

impl ChannelType {
    /// The envelope spelling of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Multimesh => "multimesh",
            Self::Amrmesh => "amrmesh",
            Self::Ioss => "ioss",
            Self::Fides => "fides",
        }
    }

    /// True for types whose `data` children are each a mesh.
    pub fn is_multi(self) -> bool {
        matches!(self, Self::Multimesh | Self::Amrmesh)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mesh" => Ok(Self::Mesh),
            "multimesh" => Ok(Self::Multimesh),
            "amrmesh" => Ok(Self::Amrmesh),
            "ioss" => Ok(Self::Ioss),
            "fides" => Ok(Self::Fides),
            other => Err(UnknownName::ChannelType(other.to_string())),
        }
    }
}

pub(crate) fn verify(node: &Node, mesh: &dyn MeshSchema) -> Check {
    verify_envelope(node)?;
    if let Some(channels) = node.child("channels") {
        for (name, channel) in channels.entries() {
            verify_channel(&name, channel, mesh)?;
        }
    }
    Ok(())
}

/// Everything `verify` checks except the contents of each channel.
pub(crate) fn verify_envelope(node: &Node) -> Check {
    check::object(node, "")?;

    let state = check::required(node, "", "state")?;
    check::object(state, "state")?;
    if state.child("timestep").is_none() && state.child("cycle").is_none() {
        return Err(SchemaError::new(
            "state/timestep",
            "one of 'timestep' or 'cycle' is required",
        ));
    }
    check::required(state, "state", "time")?;
    step_fields(state, "state")?;
    check::optional(state, "state", "pipelines", check::string_list)?;
    check::optional(state, "state", "parameters", check::string_list)?;

    check::optional(node, "", "channels", |n, p| check::object(n, p).map(drop))
}

/// Validate a single channel found at `channels/<name>`.
pub(crate) fn verify_channel(name: &str, node: &Node, mesh: &dyn MeshSchema) -> Check {
    let path = join("channels", name);
    check::object(node, &path)?;

    let type_path = join(&path, "type");
    let kind = check::required(node, &path, "type")?;
    let kind = check::string(kind, &type_path)?;
    let data_path = join(&path, "data");
    let data = check::required(node, &path, "data")?;
    check::object(data, &data_path)?;

    if let Some(state) = node.child("state") {
        let state_path = join(&path, "state");
        check::object(state, &state_path)?;
        step_fields(state, &state_path)?;
    }

    let kind: ChannelType = kind.parse().map_err(|_| {
        SchemaError::new(&type_path, format!("unsupported channel type '{kind}'"))
    })?;
    match kind {
        ChannelType::Mesh => {
            mesh.verify_mesh(data, &data_path)?;
            if let Some(fields) = node.get_path("state/fields") {
                state_fields(fields, &join(&path, "state/fields"), mesh)?;
            }
        }
        ChannelType::Multimesh | ChannelType::Amrmesh => {
            for (block, child) in data.entries() {
                mesh.verify_mesh(child, &join(&data_path, &block))?;
            }
            if let Some(assembly) = node.child("assembly") {
                verify_assembly(assembly, &join(&path, "assembly"))?;
            }
        }
        ChannelType::Ioss | ChannelType::Fides => {}
    }
    Ok(())
}

/// String, list of strings, or an object of nested assemblies.
pub(crate) fn verify_assembly(node: &Node, path: &str) -> Check {
    match node {
        Node::String(_) => Ok(()),
        Node::List(_) => check::string_list(node, path),
        Node::Object(map) => {
            for (name, child) in map {
                verify_assembly(child, &join(path, name))?;
            }
            Ok(())
        }
        other => Err(check::mismatch(path, "string, list of strings or object", other)),
    }
}

/// Typed leaves shared by the top-level state and per-channel overrides.
fn step_fields(state: &Node, path: &str) -> Check {
    for key in ["timestep", "cycle", "multiblock"] {
        check::optional(state, path, key, |n, p| check::integer(n, p).map(drop))?;
    }
    check::optional(state, path, "time", |n, p| check::number(n, p).map(drop))
}

fn state_fields(fields: &Node, path: &str, mesh: &dyn MeshSchema) -> Check {
    check::object(fields, path)?;
    for (name, field) in fields.entries() {
        let field_path = join(path, &name);
        match field {
            Node::String(_) | Node::NumericArray(_) => {}
            Node::Object(_) => mesh.verify_mcarray(field, &field_path)?,
            other => {
                return Err(check::mismatch(
                    &field_path,
                    "string, numeric array or mcarray",
                    other,
                ));
            }
        }
    }
    Ok(())
}
