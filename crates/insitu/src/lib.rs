//! insitu: an in-situ co-processing runtime for numerical simulations.
//!
//! The simulation drives a [`Session`] through four entry points
//! (`initialize`, `execute`, `results`, `finalize`), each passing a
//! self-describing [`Node`](types::Node) whose `catalyst` child follows the
//! protocol schema. Every call returns a [`Status`]; nothing panics into the
//! host.
//!
//! # Quick start
//!
//! ```rust
//! use insitu::prelude::*;
//!
//! let session = Session::new();
//! let init = Node::from_json_str(r#"{"catalyst": {}}"#).unwrap();
//! assert_eq!(session.initialize(&init), Status::Ok);
//!
//! let mut step = Node::from_json_str(r#"{
//!     "catalyst": {
//!         "state": {"timestep": 0, "time": 0.0},
//!         "channels": {
//!             "grid": {
//!                 "type": "mesh",
//!                 "data": {
//!                     "coordsets": {"coords": {"type": "uniform", "dims": {"i": 2, "j": 2}}},
//!                     "topologies": {"mesh": {"type": "uniform", "coordset": "coords"}}
//!                 }
//!             }
//!         }
//!     }
//! }"#).unwrap();
//! assert_eq!(session.execute(&mut step), Status::Ok);
//! assert_eq!(session.finalize(&Node::Null), Status::Ok);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `insitu-core` | `Node`, paths, step stamps, core errors |
//! | [`blueprint`] | `insitu-blueprint` | Protocol schemas and the mesh verifier |
//! | [`engine`] | `insitu-engine` | Dispatcher, registry, pipelines, collaborators |
//! | [`logging`] | | Subscriber bootstrap |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod logging;
pub mod session;
pub mod status;

pub use session::Session;
pub use status::Status;

/// Node tree, paths and core error types (`insitu-core`).
pub use insitu_core as types;

/// Protocol validation (`insitu-blueprint`).
///
/// [`blueprint::Validator`] checks envelopes against a
/// [`blueprint::Protocol`]; [`blueprint::MeshSchema`] is the seam for an
/// external mesh codec.
pub use insitu_blueprint as blueprint;

/// Orchestration (`insitu-engine`).
///
/// Use it directly for the [`engine::Dispatcher`] without the
/// status-code boundary, or to implement [`engine::Pipeline`] and the
/// collaborator traits.
pub use insitu_engine as engine;

/// Common imports for hosts and pipeline authors.
///
/// ```rust
/// use insitu::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Session, Status};

    // Data model
    pub use insitu_core::{Node, StepStamp};

    // Configuration and collaborators
    pub use insitu_engine::{Collaborators, EngineConfig, FailureReporting};

    // Pipelines
    pub use insitu_engine::{Pipeline, PipelineContext, PipelineKind};
}
