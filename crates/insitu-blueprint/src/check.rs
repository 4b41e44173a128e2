//! Small typed-leaf checks shared by the protocol schemas.

use insitu_core::path::join;
use insitu_core::{Node, NodeMap, SchemaError};

pub(crate) type Check<T = ()> = Result<T, SchemaError>;

pub(crate) fn mismatch(path: &str, expected: &str, node: &Node) -> SchemaError {
    SchemaError::new(path, format!("expected {expected}, got {}", node.kind()))
}

pub(crate) fn object<'a>(node: &'a Node, path: &str) -> Check<&'a NodeMap> {
    node.as_object().ok_or_else(|| mismatch(path, "object", node))
}

/// Object or list: anything with enumerable children.
pub(crate) fn container(node: &Node, path: &str) -> Check {
    if node.is_object() || node.is_list() {
        Ok(())
    } else {
        Err(mismatch(path, "object or list", node))
    }
}

pub(crate) fn required<'a>(node: &'a Node, path: &str, name: &str) -> Check<&'a Node> {
    node.child(name)
        .ok_or_else(|| SchemaError::new(join(path, name), "required child is missing"))
}

pub(crate) fn string<'a>(node: &'a Node, path: &str) -> Check<&'a str> {
    node.as_str().ok_or_else(|| mismatch(path, "string", node))
}

pub(crate) fn integer(node: &Node, path: &str) -> Check<i64> {
    node.as_i64().ok_or_else(|| mismatch(path, "int64", node))
}

pub(crate) fn number(node: &Node, path: &str) -> Check<f64> {
    node.as_number().ok_or_else(|| mismatch(path, "number", node))
}

pub(crate) fn string_list(node: &Node, path: &str) -> Check {
    let items = node
        .as_list()
        .ok_or_else(|| mismatch(path, "list of strings", node))?;
    for (i, item) in items.iter().enumerate() {
        string(item, &join(path, &i.to_string()))?;
    }
    Ok(())
}

/// Check an optional child with `f` when present.
pub(crate) fn optional(
    node: &Node,
    path: &str,
    name: &str,
    f: impl FnOnce(&Node, &str) -> Check,
) -> Check {
    match node.child(name) {
        Some(child) => f(child, &join(path, name)),
        None => Ok(()),
    }
}
