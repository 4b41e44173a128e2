//! The `initialize` protocol schema.

use insitu_core::path::join;
use insitu_core::Node;

use crate::check::{self, Check};

/// Validate the `catalyst` node handed to `initialize`.
///
/// A null node (nothing configured) is valid.
pub(crate) fn verify(node: &Node) -> Check {
    if node.is_null() {
        return Ok(());
    }
    check::object(node, "")?;
    check::optional(node, "", "scripts", scripts)?;
    check::optional(node, "", "pipelines", pipelines)?;
    check::optional(node, "", "proxies", proxies)?;
    check::optional(node, "", "mpi_comm", |n, p| check::integer(n, p).map(drop))?;
    Ok(())
}

fn scripts(node: &Node, path: &str) -> Check {
    check::container(node, path)?;
    for (name, child) in node.entries() {
        let child_path = join(path, &name);
        match child {
            Node::String(_) => {}
            Node::Object(_) => {
                let filename = check::required(child, &child_path, "filename")?;
                check::string(filename, &join(&child_path, "filename"))?;
                check::optional(child, &child_path, "args", check::string_list)?;
            }
            other => {
                return Err(check::mismatch(&child_path, "string or object", other));
            }
        }
    }
    Ok(())
}

fn pipelines(node: &Node, path: &str) -> Check {
    check::container(node, path)?;
    for (name, child) in node.entries() {
        let child_path = join(path, &name);
        check::object(child, &child_path)?;
        let kind = check::required(child, &child_path, "type")?;
        let kind = check::string(kind, &join(&child_path, "type"))?;
        if kind == "io" {
            for key in ["filename", "channel"] {
                let leaf = check::required(child, &child_path, key)?;
                check::string(leaf, &join(&child_path, key))?;
            }
        }
    }
    Ok(())
}

fn proxies(node: &Node, path: &str) -> Check {
    check::container(node, path)?;
    for (name, child) in node.entries() {
        let child_path = join(path, &name);
        match child {
            Node::String(_) => {}
            Node::Object(_) => {
                let filename = check::required(child, &child_path, "filename")?;
                check::string(filename, &join(&child_path, "filename"))?;
            }
            other => {
                return Err(check::mismatch(&child_path, "string or object", other));
            }
        }
    }
    Ok(())
}
