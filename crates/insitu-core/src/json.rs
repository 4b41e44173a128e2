//! JSON bridge for [`Node`].
//!
//! Hosts and tests describe envelopes as JSON; the IO pipeline's built-in
//! writer emits producer content as JSON. Arrays whose elements are all
//! numbers become [`NumericArray`] leaves (`Int64` when every element is
//! an integer, `Float64` otherwise); every other array becomes a
//! [`Node::List`]. Object order is preserved.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use crate::node::{Node, NodeMap, NumericArray};

impl Node {
    /// Parse a JSON document into a node.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Render the node as compact JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Int(i),
                None => n.as_f64().map_or(Node::Null, Node::Float),
            },
            Value::String(s) => Node::String(s),
            Value::Array(items) => array_to_node(items),
            Value::Object(map) => Node::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Node::from(v)))
                    .collect::<NodeMap>(),
            ),
        }
    }
}

fn array_to_node(items: Vec<Value>) -> Node {
    let numeric = !items.is_empty() && items.iter().all(Value::is_number);
    if !numeric {
        return Node::List(items.into_iter().map(Node::from).collect());
    }
    if items.iter().all(|v| v.as_i64().is_some()) {
        Node::NumericArray(NumericArray::Int64(
            items.iter().filter_map(Value::as_i64).collect(),
        ))
    } else {
        Node::NumericArray(NumericArray::Float64(
            items.iter().filter_map(Value::as_f64).collect(),
        ))
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Int(i) => Value::from(*i),
            Node::Float(f) => Value::from(*f),
            Node::String(s) => Value::String(s.clone()),
            Node::NumericArray(NumericArray::Int64(v)) => Value::from(v.clone()),
            Node::NumericArray(NumericArray::Float64(v)) => Value::from(v.clone()),
            Node::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Int(i) => serializer.serialize_i64(*i),
            Node::Float(f) => serializer.serialize_f64(*f),
            Node::String(s) => serializer.serialize_str(s),
            Node::NumericArray(NumericArray::Int64(v)) => v.serialize(serializer),
            Node::NumericArray(NumericArray::Float64(v)) => v.serialize(serializer),
            Node::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}
