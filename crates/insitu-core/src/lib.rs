//! Core types for the insitu co-processing runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! [`Node`] value model used both as wire format and internal snapshot,
//! `/`-separated path helpers, the JSON bridge, the step stamp carried
//! through every lifecycle call, and the error types shared across the
//! workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod json;
pub mod node;
pub mod path;
pub mod step;

pub use error::{CollaboratorError, LifecycleError, RegistryError, SchemaError};
pub use node::{Entries, Node, NodeKind, NodeMap, NumericArray};
pub use step::StepStamp;
