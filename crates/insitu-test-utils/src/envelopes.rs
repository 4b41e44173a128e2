//! Protocol envelope fixtures.
//!
//! Functions return the `catalyst` subtree unless named otherwise; wrap
//! one with [`envelope`] to get the full node passed to the entry points.

use insitu_core::Node;
use serde_json::json;

/// `{ "catalyst": catalyst }`.
pub fn envelope(catalyst: Node) -> Node {
    let mut root = Node::object();
    root.insert("catalyst", catalyst);
    root
}

/// A small valid uniform mesh with one vertex field.
pub fn mesh_data() -> Node {
    Node::from(json!({
        "coordsets": {
            "coords": {"type": "uniform", "dims": {"i": 3, "j": 2}}
        },
        "topologies": {
            "mesh": {"type": "uniform", "coordset": "coords"}
        },
        "fields": {
            "temperature": {
                "association": "vertex",
                "topology": "mesh",
                "values": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
            }
        }
    }))
}

/// A mesh the built-in verifier rejects (no coordsets).
pub fn invalid_mesh_data() -> Node {
    Node::from(json!({
        "coordsets": {},
        "topologies": {"mesh": {"type": "uniform", "coordset": "coords"}}
    }))
}

/// `{type, data}` channel node.
pub fn channel(channel_type: &str, data: Node) -> Node {
    let mut node = Node::object();
    node.insert("type", channel_type);
    node.insert("data", data);
    node
}

/// A valid `mesh` channel.
pub fn mesh_channel() -> Node {
    channel("mesh", mesh_data())
}

/// A `multimesh` channel with `blocks` copies of [`mesh_data`].
pub fn multimesh_channel(blocks: usize) -> Node {
    let mut data = Node::object();
    for i in 0..blocks {
        data.insert(format!("block_{i}"), mesh_data());
    }
    channel("multimesh", data)
}

/// `execute` subtree with the given state and channels in order.
pub fn execute(timestep: i64, time: f64, channels: Vec<(&str, Node)>) -> Node {
    let mut state = Node::object();
    state.insert("timestep", timestep);
    state.insert("time", time);
    let mut catalyst = Node::object();
    catalyst.insert("state", state);
    if !channels.is_empty() {
        let mut map = Node::object();
        for (name, node) in channels {
            map.insert(name, node);
        }
        catalyst.insert("channels", map);
    }
    catalyst
}

/// `execute` subtree with one valid mesh channel named `grid`.
pub fn execute_grid(timestep: i64, time: f64) -> Node {
    execute(timestep, time, vec![("grid", mesh_channel())])
}

/// `initialize` subtree declaring one IO pipeline.
pub fn initialize_io(filename: &str, channel: &str) -> Node {
    Node::from(json!({
        "pipelines": {
            "writer": {"type": "io", "filename": filename, "channel": channel}
        }
    }))
}

/// `initialize` subtree declaring the given script files.
pub fn initialize_scripts(files: &[&str]) -> Node {
    Node::from(json!({ "scripts": files }))
}
