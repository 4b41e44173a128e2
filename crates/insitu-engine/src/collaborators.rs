//! Pluggable collaborators the dispatcher calls into.
//!
//! Everything outside the orchestration core (the mesh codec, the script
//! runtime, on-disk step readers, proxy loading and steering transport) is
//! reached through a trait object held here. Defaults cover the built-in
//! implementations; absent collaborators degrade the dependent feature
//! with a logged error rather than failing the step.

use insitu_blueprint::{BlueprintMeshSchema, MeshSchema};
use insitu_core::CollaboratorError;

use crate::channel::StepSourceFactory;
use crate::script::ScriptLoader;
use crate::steering::{ExternalChangeWaiter, MeshInitializer};
use crate::writer::{JsonWriterFactory, WriterFactory};

/// Loads proxy definition files listed under `catalyst/proxies`.
pub trait ProxyLoader: Send {
    /// Load one proxy definition file.
    fn load(&mut self, filename: &str) -> Result<(), CollaboratorError>;
}

/// The dispatcher's collaborator set.
pub struct Collaborators {
    pub(crate) mesh_schema: Box<dyn MeshSchema>,
    pub(crate) writers: Option<Box<dyn WriterFactory>>,
    pub(crate) scripts: Option<Box<dyn ScriptLoader>>,
    pub(crate) step_sources: Option<Box<dyn StepSourceFactory>>,
    pub(crate) mesh_initializer: Option<Box<dyn MeshInitializer>>,
    pub(crate) proxies: Option<Box<dyn ProxyLoader>>,
    pub(crate) change_waiter: Option<Box<dyn ExternalChangeWaiter>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("writers", &self.writers.is_some())
            .field("scripts", &self.scripts.is_some())
            .field("step_sources", &self.step_sources.is_some())
            .field("mesh_initializer", &self.mesh_initializer.is_some())
            .field("proxies", &self.proxies.is_some())
            .field("change_waiter", &self.change_waiter.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Collaborators {
    /// Built-in mesh verifier and JSON writer, plus the rhai runtime when
    /// the `scripting` feature is on.
    fn default() -> Self {
        Self {
            mesh_schema: Box::new(BlueprintMeshSchema),
            writers: Some(Box::new(JsonWriterFactory)),
            scripts: default_script_loader(),
            step_sources: None,
            mesh_initializer: None,
            proxies: None,
            change_waiter: None,
        }
    }
}

impl Collaborators {
    /// Defaults; see [`Default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// No collaborators beyond the built-in mesh verifier.
    pub fn none() -> Self {
        Self {
            writers: None,
            scripts: None,
            ..Self::default()
        }
    }

    /// Replace the mesh verifier.
    pub fn with_mesh_schema(mut self, schema: impl MeshSchema + 'static) -> Self {
        self.mesh_schema = Box::new(schema);
        self
    }

    /// Replace the writer factory used by IO pipelines.
    pub fn with_writers(mut self, writers: impl WriterFactory + 'static) -> Self {
        self.writers = Some(Box::new(writers));
        self
    }

    /// Remove the writer factory.
    pub fn without_writers(mut self) -> Self {
        self.writers = None;
        self
    }

    /// Replace the script runtime.
    pub fn with_scripts(mut self, loader: impl ScriptLoader + 'static) -> Self {
        self.scripts = Some(Box::new(loader));
        self
    }

    /// Remove the script runtime.
    pub fn without_scripts(mut self) -> Self {
        self.scripts = None;
        self
    }

    /// Install the step source factory used by `fides` channels.
    pub fn with_step_sources(mut self, sources: impl StepSourceFactory + 'static) -> Self {
        self.step_sources = Some(Box::new(sources));
        self
    }

    /// Install the steering mesh initializer.
    pub fn with_mesh_initializer(mut self, initializer: impl MeshInitializer + 'static) -> Self {
        self.mesh_initializer = Some(Box::new(initializer));
        self
    }

    /// Install the proxy loader.
    pub fn with_proxies(mut self, proxies: impl ProxyLoader + 'static) -> Self {
        self.proxies = Some(Box::new(proxies));
        self
    }

    /// Install the external change waiter.
    pub fn with_change_waiter(mut self, waiter: impl ExternalChangeWaiter + 'static) -> Self {
        self.change_waiter = Some(Box::new(waiter));
        self
    }

    /// True if script pipelines can be loaded.
    pub fn scripting_available(&self) -> bool {
        self.scripts.is_some()
    }

    /// True if `fides` channels can be served.
    pub fn fides_available(&self) -> bool {
        self.step_sources.is_some()
    }

    /// The mesh verifier.
    pub fn mesh_schema(&self) -> &dyn MeshSchema {
        self.mesh_schema.as_ref()
    }
}

/// The built-in script runtime, if compiled in.
pub fn default_script_loader() -> Option<Box<dyn ScriptLoader>> {
    #[cfg(feature = "scripting")]
    {
        Some(Box::new(crate::scripting::RhaiLoader::new()))
    }
    #[cfg(not(feature = "scripting"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_keeps_only_mesh_schema() {
        let c = Collaborators::none();
        assert!(!c.scripting_available());
        assert!(!c.fides_available());
        assert!(c.writers.is_none());
    }

    #[test]
    fn defaults_include_json_writer() {
        let c = Collaborators::default();
        assert!(c.writers.is_some());
        assert_eq!(c.scripting_available(), cfg!(feature = "scripting"));
    }
}
