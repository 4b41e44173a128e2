//! Protocol names and the [`Validator`] entry point.

use std::fmt;
use std::str::FromStr;

use insitu_core::{Node, SchemaError};

use crate::mesh::{BlueprintMeshSchema, MeshSchema};
use crate::{execute, initialize};

/// The schemas a node can be checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// The `catalyst` node passed to `initialize`.
    Initialize,
    /// The `catalyst` node passed to `execute`.
    Execute,
    /// The `catalyst` node passed to `finalize`. Always valid.
    Finalize,
    /// A channel assembly: string, list of strings, or nested object.
    Assembly,
}

impl Protocol {
    /// Lower-case protocol name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Execute => "execute",
            Self::Finalize => "finalize",
            Self::Assembly => "assembly",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(Self::Initialize),
            "execute" => Ok(Self::Execute),
            "finalize" => Ok(Self::Finalize),
            "assembly" => Ok(Self::Assembly),
            other => Err(UnknownName::Protocol(other.to_string())),
        }
    }
}

/// A name that does not parse as a [`Protocol`] or
/// [`ChannelType`](crate::ChannelType).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnknownName {
    /// Not one of `initialize`, `execute`, `finalize`, `assembly`.
    #[error("unknown protocol '{0}'")]
    Protocol(String),
    /// Not one of the supported channel types.
    #[error("unknown channel type '{0}'")]
    ChannelType(String),
}

/// Checks protocol nodes, delegating mesh payloads to a [`MeshSchema`].
///
/// A validator borrows its mesh schema; it holds no other state and is
/// cheap to construct per call.
#[derive(Clone, Copy)]
pub struct Validator<'a> {
    mesh: &'a dyn MeshSchema,
}

impl fmt::Debug for Validator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Default for Validator<'static> {
    fn default() -> Self {
        Self {
            mesh: &BlueprintMeshSchema,
        }
    }
}

impl<'a> Validator<'a> {
    /// Validator using `mesh` for mesh and mcarray checks.
    pub fn new(mesh: &'a dyn MeshSchema) -> Self {
        Self { mesh }
    }

    /// Check `node` against `protocol`, logging the offending path on
    /// failure.
    ///
    /// For [`Protocol::Initialize`] a [`Node::Null`] stands for an absent
    /// node and is valid.
    pub fn verify(&self, protocol: Protocol, node: &Node) -> bool {
        match self.verify_detailed(protocol, node) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    protocol = %protocol,
                    path = %e.path,
                    reason = %e.reason,
                    "node failed protocol validation"
                );
                false
            }
        }
    }

    /// Like [`verify`](Self::verify), returning the offending path and
    /// reason instead of logging.
    pub fn verify_detailed(&self, protocol: Protocol, node: &Node) -> Result<(), SchemaError> {
        match protocol {
            Protocol::Initialize => initialize::verify(node),
            Protocol::Execute => execute::verify(node, self.mesh),
            Protocol::Finalize => Ok(()),
            Protocol::Assembly => execute::verify_assembly(node, ""),
        }
    }

    /// The `execute` schema without the per-channel checks: `state` and
    /// the shape of the `channels` container only.
    ///
    /// The dispatcher rejects a step on this check and then validates each
    /// channel with [`verify_channel`](Self::verify_channel), so that one
    /// bad channel is skipped on its own.
    pub fn verify_execute_envelope(&self, node: &Node) -> Result<(), SchemaError> {
        execute::verify_envelope(node)
    }

    /// Validate the channel `name` alone, as found under
    /// `catalyst/channels/<name>`.
    ///
    /// Error paths are rooted at `channels/<name>`.
    pub fn verify_channel(&self, name: &str, node: &Node) -> Result<(), SchemaError> {
        execute::verify_channel(name, node, self.mesh)
    }
}
