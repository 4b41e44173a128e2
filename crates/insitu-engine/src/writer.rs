//! Mesh writers used by IO pipelines.
//!
//! The mesh codec is a collaborator: the engine only asks a
//! [`WriterFactory`] for a [`MeshWriter`] bound to a channel and hands it
//! a materialized [`Producer`]. [`JsonWriterFactory`] is the built-in
//! codec, writing the producer output as pretty-printed JSON.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use insitu_core::CollaboratorError;
use thiserror::Error;

use crate::producer::Producer;

/// Errors from creating or using a writer.
#[derive(Debug, Error)]
pub enum WriterError {
    /// No writer is available for the channel.
    #[error(transparent)]
    Unavailable(#[from] CollaboratorError),
    /// The producer has not materialized any output.
    #[error("channel '{channel}' has no materialized output")]
    NoOutput {
        /// The channel being written.
        channel: String,
    },
    /// Creating or writing the output file failed.
    #[error("cannot write '{}': {source}", path.display())]
    Io {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Encoding the output failed.
    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes one channel's materialized output to files.
pub trait MeshWriter: Send {
    /// Write `producer`'s current output to `path`.
    fn write(&mut self, path: &Path, producer: &Producer, time: f64) -> Result<(), WriterError>;
}

/// Creates [`MeshWriter`]s bound to a channel.
pub trait WriterFactory: Send + Sync {
    /// Create a writer for `channel`.
    fn create(&self, channel: &str) -> Result<Box<dyn MeshWriter>, WriterError>;
}

/// Built-in factory producing [`JsonWriter`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonWriterFactory;

impl WriterFactory for JsonWriterFactory {
    fn create(&self, channel: &str) -> Result<Box<dyn MeshWriter>, WriterError> {
        Ok(Box::new(JsonWriter {
            channel: channel.to_string(),
            files_written: 0,
        }))
    }
}

/// Writes producer output as pretty JSON, creating parent directories.
#[derive(Debug)]
pub struct JsonWriter {
    channel: String,
    files_written: u64,
}

impl JsonWriter {
    /// Number of files written so far.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }
}

impl MeshWriter for JsonWriter {
    fn write(&mut self, path: &Path, producer: &Producer, time: f64) -> Result<(), WriterError> {
        let output = producer.output().ok_or_else(|| WriterError::NoOutput {
            channel: self.channel.clone(),
        })?;
        let io_err = |source| WriterError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs::File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, output)?;
        out.write_all(b"\n").map_err(io_err)?;
        out.flush().map_err(io_err)?;
        self.files_written += 1;
        tracing::trace!(channel = %self.channel, path = %path.display(), time, "wrote channel output");
        Ok(())
    }
}
