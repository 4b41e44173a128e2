//! Steering: parameter values pushed from analysis back into the
//! simulation.
//!
//! Pipelines (or the host) [`set`](Steering::set) values on named targets
//! during a step. At the start of the next `execute`, before any pipeline
//! runs, the dispatcher [`flush`](Steering::flush)es pending values through
//! the [`MeshInitializer`] collaborator and moves them to the applied set.

use indexmap::IndexMap;
use insitu_core::{Node, NodeMap};

use crate::registry::Registry;

/// Pushes steering values into the simulation-side meshes.
pub trait MeshInitializer: Send {
    /// Apply `values` (an object of parameter → value) for `target`.
    /// Returns false if the values could not be applied.
    fn push(&mut self, target: &str, values: &Node, registry: &mut Registry) -> bool;
}

/// Blocks until an external steering client changes something.
pub trait ExternalChangeWaiter: Send {
    /// Wait for a change. Returns true if one arrived.
    fn wait_for_external_change(&mut self) -> bool;
}

#[derive(Debug, Default)]
struct Target {
    pending: NodeMap,
    applied: NodeMap,
}

/// Named steering targets with pending and applied parameter values.
#[derive(Debug, Default)]
pub struct Steering {
    targets: IndexMap<String, Target>,
}

impl Steering {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `value` for `parameter` on `target`, replacing any pending
    /// value for the same parameter.
    pub fn set(&mut self, target: &str, parameter: &str, value: impl Into<Node>) {
        self.targets
            .entry(target.to_string())
            .or_default()
            .pending
            .insert(parameter.to_string(), value.into());
    }

    /// Pending value for `parameter` on `target`.
    pub fn pending(&self, target: &str, parameter: &str) -> Option<&Node> {
        self.targets.get(target)?.pending.get(parameter)
    }

    /// Last applied value for `parameter` on `target`.
    pub fn applied(&self, target: &str, parameter: &str) -> Option<&Node> {
        self.targets.get(target)?.applied.get(parameter)
    }

    /// True if any target has values waiting to be pushed.
    pub fn has_pending(&self) -> bool {
        self.targets.values().any(|t| !t.pending.is_empty())
    }

    /// Target names in first-use order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Push every pending value through `initializer`. Returns the number
    /// of targets applied.
    ///
    /// Values stay pending when there is no initializer or it rejects
    /// them.
    pub fn flush(
        &mut self,
        initializer: Option<&mut (dyn MeshInitializer + '_)>,
        registry: &mut Registry,
    ) -> usize {
        if !self.has_pending() {
            return 0;
        }
        let Some(initializer) = initializer else {
            tracing::debug!("steering values pending but no mesh initializer is installed");
            return 0;
        };
        let mut applied = 0;
        for (name, target) in &mut self.targets {
            if target.pending.is_empty() {
                continue;
            }
            let values = Node::Object(target.pending.clone());
            if initializer.push(name, &values, registry) {
                let pending = std::mem::take(&mut target.pending);
                target.applied.extend(pending);
                applied += 1;
            } else {
                tracing::error!(steering_target = %name, "mesh initializer rejected steering values");
            }
        }
        applied
    }

    /// Forget every target.
    pub fn clear(&mut self) {
        self.targets.clear();
    }
}
