//! Pipeline that writes one channel to disk every step.

use std::path::PathBuf;

use crate::pipeline::{Pipeline, PipelineContext};
use crate::template::{self, TemplateArgs};
use crate::writer::MeshWriter;

/// Writes a channel's producer output to a templated filename.
///
/// The filename may use legacy printf tokens (`%04d`, `%6.2f`, `%ts`) or
/// brace fields (`{timestep:04d}`, `{time}`); legacy tokens are
/// translated before rendering. Relative paths are resolved against
/// [`EngineConfig::output_directory`](crate::config::EngineConfig::output_directory).
pub struct IoPipeline {
    name: String,
    filename: String,
    channel: String,
    writer: Option<Box<dyn MeshWriter>>,
    files_written: u64,
}

impl std::fmt::Debug for IoPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoPipeline")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("channel", &self.channel)
            .field("has_writer", &self.writer.is_some())
            .field("files_written", &self.files_written)
            .finish()
    }
}

impl IoPipeline {
    /// Pipeline `name` writing `channel` to `filename`.
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            channel: channel.into(),
            writer: None,
            files_written: 0,
        }
    }

    /// Filename template as configured.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Channel being written.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Files written so far.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    fn output_path(&self, ctx: &PipelineContext<'_>, timestep: i64, time: f64) -> Option<PathBuf> {
        let brace = template::translate_legacy(&self.filename);
        match template::render(&brace, &TemplateArgs::new(timestep, time)) {
            Ok(rendered) => Some(ctx.config().resolve_output(&rendered)),
            Err(e) => {
                tracing::error!(pipeline = %self.name, filename = %self.filename, "bad filename template: {e}");
                None
            }
        }
    }
}

impl Pipeline for IoPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, ctx: &mut PipelineContext<'_>) -> bool {
        if self.filename.is_empty() {
            tracing::error!(pipeline = %self.name, "io pipeline has no filename");
            return false;
        }
        if self.channel.is_empty() {
            tracing::error!(pipeline = %self.name, "io pipeline has no channel");
            return false;
        }
        if ctx.registry().get_producer(&self.channel).is_none() {
            tracing::error!(
                pipeline = %self.name,
                channel = %self.channel,
                "no producer is registered for the io pipeline's channel"
            );
            return false;
        }
        true
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, time: f64) -> bool {
        if self.writer.is_none() {
            let Some(factory) = ctx.writer_factory() else {
                tracing::error!(pipeline = %self.name, "no mesh writer is installed");
                return false;
            };
            match factory.create(&self.channel) {
                Ok(writer) => self.writer = Some(writer),
                Err(e) => {
                    tracing::error!(pipeline = %self.name, channel = %self.channel, "cannot create writer: {e}");
                    return false;
                }
            }
        }

        let Some(path) = self.output_path(ctx, timestep, time) else {
            return false;
        };
        let Some(producer) = ctx.registry_mut().get_producer_mut(&self.channel) else {
            tracing::error!(pipeline = %self.name, channel = %self.channel, "channel producer disappeared");
            return false;
        };
        producer.update(time);
        let Some(writer) = self.writer.as_mut() else {
            return false;
        };
        match writer.write(&path, producer, time) {
            Ok(()) => {
                self.files_written += 1;
                tracing::debug!(pipeline = %self.name, path = %path.display(), "channel written");
                true
            }
            Err(e) => {
                tracing::error!(pipeline = %self.name, path = %path.display(), "write failed: {e}");
                false
            }
        }
    }

    fn finalize(&mut self, _ctx: &mut PipelineContext<'_>) -> bool {
        self.writer = None;
        true
    }
}
