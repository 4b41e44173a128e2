//! Mesh payload schema: the [`MeshSchema`] trait and its built-in
//! structural implementation.
//!
//! The protocol validator delegates everything below a channel's `data`
//! node to a `MeshSchema`. Hosts with a richer mesh model can plug in
//! their own verifier; [`BlueprintMeshSchema`] checks the conduit-style
//! `coordsets` / `topologies` / `fields` layout.

use insitu_core::path::join;
use insitu_core::{Node, SchemaError};

use crate::check::{self, Check};

/// Structural verifier for mesh payloads.
///
/// `path` is the location of `node` inside the envelope and must prefix
/// every [`SchemaError::path`] returned.
pub trait MeshSchema: Send + Sync {
    /// Check that `node` describes a single mesh.
    fn verify_mesh(&self, node: &Node, path: &str) -> Result<(), SchemaError>;

    /// Check that `node` is a multi-component array.
    fn verify_mcarray(&self, node: &Node, path: &str) -> Result<(), SchemaError>;
}

const COORDSET_TYPES: [&str; 3] = ["uniform", "rectilinear", "explicit"];
const TOPOLOGY_TYPES: [&str; 5] = ["points", "uniform", "rectilinear", "structured", "unstructured"];
const ASSOCIATIONS: [&str; 2] = ["vertex", "element"];

/// Built-in conduit-style mesh verifier.
///
/// Checks shape only: required children, leaf types, and that topology and
/// field references resolve. It does not check that array lengths agree
/// with the declared dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlueprintMeshSchema;

impl MeshSchema for BlueprintMeshSchema {
    fn verify_mesh(&self, node: &Node, path: &str) -> Result<(), SchemaError> {
        check::object(node, path)?;

        let coordsets_path = join(path, "coordsets");
        let coordsets = check::required(node, path, "coordsets")?;
        non_empty_object(coordsets, &coordsets_path)?;
        for (name, coordset) in coordsets.entries() {
            verify_coordset(coordset, &join(&coordsets_path, &name))?;
        }

        let topologies_path = join(path, "topologies");
        let topologies = check::required(node, path, "topologies")?;
        non_empty_object(topologies, &topologies_path)?;
        for (name, topology) in topologies.entries() {
            verify_topology(topology, coordsets, &join(&topologies_path, &name))?;
        }

        if let Some(fields) = node.child("fields") {
            let fields_path = join(path, "fields");
            check::object(fields, &fields_path)?;
            for (name, field) in fields.entries() {
                self.verify_field(field, topologies, &join(&fields_path, &name))?;
            }
        }
        Ok(())
    }

    fn verify_mcarray(&self, node: &Node, path: &str) -> Result<(), SchemaError> {
        non_empty_object(node, path)?;
        let mut expected: Option<usize> = None;
        for (name, component) in node.entries() {
            let component_path = join(path, &name);
            let array = component
                .as_numeric_array()
                .ok_or_else(|| check::mismatch(&component_path, "numeric array", component))?;
            match expected {
                None => expected = Some(array.len()),
                Some(len) if len != array.len() => {
                    return Err(SchemaError::new(
                        component_path,
                        format!("component length {} differs from {len}", array.len()),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl BlueprintMeshSchema {
    fn verify_field(&self, field: &Node, topologies: &Node, path: &str) -> Check {
        check::object(field, path)?;

        let topology = check::required(field, path, "topology")?;
        let topology = check::string(topology, &join(path, "topology"))?;
        if topologies.child(topology).is_none() {
            return Err(SchemaError::new(
                join(path, "topology"),
                format!("unknown topology '{topology}'"),
            ));
        }

        let association = check::required(field, path, "association")?;
        one_of(association, &join(path, "association"), &ASSOCIATIONS)?;

        let values_path = join(path, "values");
        let values = check::required(field, path, "values")?;
        if values.is_numeric_array() {
            Ok(())
        } else if values.is_object() {
            self.verify_mcarray(values, &values_path)
        } else {
            Err(check::mismatch(&values_path, "numeric array or mcarray", values))
        }
    }
}

fn verify_coordset(node: &Node, path: &str) -> Check {
    check::object(node, path)?;
    let kind = check::required(node, path, "type")?;
    let kind = one_of(kind, &join(path, "type"), &COORDSET_TYPES)?;
    if kind == "uniform" {
        let dims_path = join(path, "dims");
        let dims = check::required(node, path, "dims")?;
        check::object(dims, &dims_path)?;
        let i = check::required(dims, &dims_path, "i")?;
        check::integer(i, &join(&dims_path, "i"))?;
    } else {
        let values_path = join(path, "values");
        let values = check::required(node, path, "values")?;
        check::object(values, &values_path)?;
        for (axis, array) in values.entries() {
            if !array.is_numeric_array() {
                return Err(check::mismatch(&join(&values_path, &axis), "numeric array", array));
            }
        }
    }
    Ok(())
}

fn verify_topology(node: &Node, coordsets: &Node, path: &str) -> Check {
    check::object(node, path)?;
    let kind = check::required(node, path, "type")?;
    let kind = one_of(kind, &join(path, "type"), &TOPOLOGY_TYPES)?;

    let coordset = check::required(node, path, "coordset")?;
    let coordset = check::string(coordset, &join(path, "coordset"))?;
    if coordsets.child(coordset).is_none() {
        return Err(SchemaError::new(
            join(path, "coordset"),
            format!("unknown coordset '{coordset}'"),
        ));
    }

    if kind == "unstructured" {
        let elements_path = join(path, "elements");
        let elements = check::required(node, path, "elements")?;
        check::object(elements, &elements_path)?;
        let shape = check::required(elements, &elements_path, "shape")?;
        check::string(shape, &join(&elements_path, "shape"))?;
        let connectivity_path = join(&elements_path, "connectivity");
        let connectivity = check::required(elements, &elements_path, "connectivity")?;
        if !connectivity.is_numeric_array() {
            return Err(check::mismatch(&connectivity_path, "numeric array", connectivity));
        }
    }
    Ok(())
}

fn non_empty_object(node: &Node, path: &str) -> Check {
    let map = check::object(node, path)?;
    if map.is_empty() {
        return Err(SchemaError::new(path, "must not be empty"));
    }
    Ok(())
}

fn one_of<'a>(node: &'a Node, path: &str, allowed: &[&str]) -> Check<&'a str> {
    let value = check::string(node, path)?;
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(SchemaError::new(
            path,
            format!("'{value}' is not one of {}", allowed.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uniform_mesh() -> Node {
        Node::from(json!({
            "coordsets": {"coords": {"type": "uniform", "dims": {"i": 3, "j": 3}}},
            "topologies": {"mesh": {"type": "uniform", "coordset": "coords"}},
            "fields": {
                "pressure": {"topology": "mesh", "association": "element", "values": [1.0, 2.0, 3.0, 4.0]}
            }
        }))
    }

    #[test]
    fn uniform_mesh_passes() {
        assert!(BlueprintMeshSchema.verify_mesh(&uniform_mesh(), "data").is_ok());
    }

    #[test]
    fn unstructured_mesh_with_mcarray_field_passes() {
        let mesh = Node::from(json!({
            "coordsets": {"coords": {"type": "explicit", "values": {"x": [0.0, 1.0, 0.0], "y": [0.0, 0.0, 1.0]}}},
            "topologies": {"mesh": {
                "type": "unstructured",
                "coordset": "coords",
                "elements": {"shape": "tri", "connectivity": [0, 1, 2]}
            }},
            "fields": {"velocity": {
                "topology": "mesh",
                "association": "vertex",
                "values": {"u": [1.0, 2.0, 3.0], "v": [0.5, 0.5, 0.5]}
            }}
        }));
        assert!(BlueprintMeshSchema.verify_mesh(&mesh, "").is_ok());
    }

    #[test]
    fn missing_coordsets_is_reported_with_prefix() {
        let mesh = Node::from(json!({"topologies": {}}));
        let e = BlueprintMeshSchema.verify_mesh(&mesh, "channels/grid/data").unwrap_err();
        assert_eq!(e.path, "channels/grid/data/coordsets");
    }

    #[test]
    fn dangling_coordset_reference_fails() {
        let mut mesh = uniform_mesh();
        mesh.set_path("topologies/mesh/coordset", "nowhere");
        let e = BlueprintMeshSchema.verify_mesh(&mesh, "").unwrap_err();
        assert_eq!(e.path, "topologies/mesh/coordset");
    }

    #[test]
    fn unknown_association_fails() {
        let mut mesh = uniform_mesh();
        mesh.set_path("fields/pressure/association", "face");
        let e = BlueprintMeshSchema.verify_mesh(&mesh, "").unwrap_err();
        assert_eq!(e.path, "fields/pressure/association");
    }

    #[test]
    fn uniform_coordset_needs_integer_i() {
        let mut mesh = uniform_mesh();
        mesh.set_path("coordsets/coords/dims/i", 3.0);
        let e = BlueprintMeshSchema.verify_mesh(&mesh, "").unwrap_err();
        assert_eq!(e.path, "coordsets/coords/dims/i");
    }

    #[test]
    fn unstructured_topology_needs_connectivity() {
        let mut mesh = uniform_mesh();
        mesh.set_path("topologies/mesh/type", "unstructured");
        mesh.set_path("topologies/mesh/elements/shape", "quad");
        let e = BlueprintMeshSchema.verify_mesh(&mesh, "").unwrap_err();
        assert_eq!(e.path, "topologies/mesh/elements/connectivity");
    }

    #[test]
    fn mcarray_requires_equal_lengths() {
        let arr = Node::from(json!({"x": [1.0, 2.0], "y": [1.0]}));
        let e = BlueprintMeshSchema.verify_mcarray(&arr, "v").unwrap_err();
        assert_eq!(e.path, "v/y");
    }

    #[test]
    fn empty_mcarray_fails() {
        assert!(BlueprintMeshSchema.verify_mcarray(&Node::object(), "v").is_err());
    }
}
