//! Benchmark profiles for the insitu runtime.
//!
//! Envelope builders sized for benchmarking:
//!
//! - [`uniform_mesh`]: an `n x n` uniform mesh with one vertex field
//! - [`explicit_mesh`]: an explicit-coordinate mesh with `points` vertices
//! - [`step_envelope`]: an `execute` subtree carrying `channels` meshes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use insitu_core::{Node, NumericArray};

/// Build an `n x n` uniform mesh with a `temperature` vertex field.
pub fn uniform_mesh(n: usize) -> Node {
    let mut mesh = Node::object();
    mesh.set_path("coordsets/coords/type", "uniform");
    mesh.set_path("coordsets/coords/dims/i", n as i64);
    mesh.set_path("coordsets/coords/dims/j", n as i64);
    mesh.set_path("topologies/mesh/type", "uniform");
    mesh.set_path("topologies/mesh/coordset", "coords");
    let values: Vec<f64> = (0..n * n).map(|k| (k % 97) as f64 * 0.5).collect();
    mesh.set_path("fields/temperature/association", "vertex");
    mesh.set_path("fields/temperature/topology", "mesh");
    mesh.set_path("fields/temperature/values", values);
    mesh
}

/// Build an explicit point mesh with `points` vertices and a three-component
/// `velocity` field.
pub fn explicit_mesh(points: usize) -> Node {
    let coord = |scale: f64| -> Node {
        Node::NumericArray(NumericArray::Float64(
            (0..points).map(|k| k as f64 * scale).collect(),
        ))
    };
    let mut mesh = Node::object();
    mesh.set_path("coordsets/coords/type", "explicit");
    mesh.set_path("coordsets/coords/values/x", coord(1.0));
    mesh.set_path("coordsets/coords/values/y", coord(0.5));
    mesh.set_path("coordsets/coords/values/z", coord(0.25));
    mesh.set_path("topologies/mesh/type", "points");
    mesh.set_path("topologies/mesh/coordset", "coords");
    mesh.set_path("fields/velocity/association", "vertex");
    mesh.set_path("fields/velocity/topology", "mesh");
    mesh.set_path("fields/velocity/values/u", coord(0.1));
    mesh.set_path("fields/velocity/values/v", coord(0.2));
    mesh.set_path("fields/velocity/values/w", coord(0.3));
    mesh
}

/// Build an `execute` subtree with `channels` uniform meshes of side `n`,
/// named `ch_0`, `ch_1`, ...
pub fn step_envelope(timestep: i64, channels: usize, n: usize) -> Node {
    let mut catalyst = Node::object();
    catalyst.set_path("state/timestep", timestep);
    catalyst.set_path("state/time", timestep as f64 * 0.01);
    for c in 0..channels {
        let base = format!("channels/ch_{c}");
        catalyst.set_path(&format!("{base}/type"), "mesh");
        catalyst.set_path(&format!("{base}/data"), uniform_mesh(n));
    }
    catalyst
}
