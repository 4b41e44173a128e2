//! Blueprint validation for insitu protocol envelopes.
//!
//! [`Validator::verify`] checks a node against one of the four protocol
//! schemas (`initialize`, `execute`, `finalize`, `assembly`) before the
//! dispatcher acts on it. Validation never mutates the node and never
//! panics; a rejection is logged with the offending path and reported as
//! `false` (or as a [`SchemaError`](insitu_core::SchemaError) through
//! [`Validator::verify_detailed`]).
//!
//! Mesh payloads are checked through the [`MeshSchema`] collaborator
//! trait. [`BlueprintMeshSchema`] is the built-in structural checker.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod check;
mod execute;
mod initialize;
pub mod mesh;
pub mod protocol;

pub use execute::ChannelType;
pub use mesh::{BlueprintMeshSchema, MeshSchema};
pub use protocol::{Protocol, UnknownName, Validator};
