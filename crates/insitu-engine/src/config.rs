//! Engine configuration, the typed view of the `initialize` envelope, and
//! configuration errors.
//!
//! [`EngineConfig`] is the host-supplied configuration for a dispatcher.
//! [`validate()`](EngineConfig::validate) checks it at construction;
//! [`from_env()`](EngineConfig::from_env) overlays `INSITU_*` environment
//! variables onto the defaults.
//!
//! [`InitConfig`] is read from a validated `catalyst` node at
//! `initialize` time and lists the pipelines to build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use insitu_core::Node;
use thiserror::Error;

// ── FailureReporting ───────────────────────────────────────────────

/// How `execute` decides whether a step failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureReporting {
    /// Any pipeline that has ever failed initialize or execute makes every
    /// step report failure.
    #[default]
    Cumulative,
    /// Only failures from the current call are reported.
    PerStep,
}

impl FailureReporting {
    /// The spelling used by `INSITU_FAILURE_REPORTING`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cumulative => "cumulative",
            Self::PerStep => "per-step",
        }
    }
}

impl fmt::Display for FailureReporting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReporting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" => Ok(Self::Cumulative),
            "per-step" | "per_step" | "perstep" => Ok(Self::PerStep),
            _ => Err(ConfigError::InvalidFailureReporting {
                value: s.to_string(),
            }),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors from [`EngineConfig::validate`] and [`EngineConfig::from_env`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `INSITU_RANK` is not a non-negative integer.
    #[error("INSITU_RANK must be a non-negative integer, got '{value}'")]
    InvalidRank {
        /// The rejected value.
        value: String,
    },
    /// `INSITU_FAILURE_REPORTING` is not `cumulative` or `per-step`.
    #[error("failure reporting must be 'cumulative' or 'per-step', got '{value}'")]
    InvalidFailureReporting {
        /// The rejected value.
        value: String,
    },
    /// A boolean variable holds something other than a boolean.
    #[error("{var} must be a boolean, got '{value}'")]
    InvalidBool {
        /// Variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
    /// `output_directory` is set to an empty path.
    #[error("output_directory must not be empty")]
    EmptyOutputDirectory,
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Host-supplied dispatcher configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rank of this process in a distributed job. Rank 0 is the root;
    /// other ranks suppress informational diagnostics. Default: 0.
    pub rank: u32,
    /// Step failure semantics. Default: [`FailureReporting::Cumulative`].
    pub failure_reporting: FailureReporting,
    /// Log a timing summary for each script pipeline at finalize (root
    /// rank only). Default: false.
    pub timing_summary: bool,
    /// Prefix for relative IO pipeline output paths. Default: none.
    pub output_directory: Option<PathBuf>,
}

impl EngineConfig {
    /// Environment variable for [`rank`](Self::rank).
    pub const ENV_RANK: &'static str = "INSITU_RANK";
    /// Environment variable for [`failure_reporting`](Self::failure_reporting).
    pub const ENV_FAILURE_REPORTING: &'static str = "INSITU_FAILURE_REPORTING";
    /// Environment variable for [`timing_summary`](Self::timing_summary).
    pub const ENV_TIMING_SUMMARY: &'static str = "INSITU_TIMING_SUMMARY";
    /// Environment variable for [`output_directory`](Self::output_directory).
    pub const ENV_OUTPUT_DIR: &'static str = "INSITU_OUTPUT_DIR";

    /// True on rank 0.
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.output_directory, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(ConfigError::EmptyOutputDirectory);
        }
        Ok(())
    }

    /// Defaults overlaid with the `INSITU_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`, which maps a variable
    /// name to its value. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(Self::ENV_RANK) {
            config.rank = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidRank { value })?;
        }
        if let Some(value) = lookup(Self::ENV_FAILURE_REPORTING) {
            config.failure_reporting = value.parse()?;
        }
        if let Some(value) = lookup(Self::ENV_TIMING_SUMMARY) {
            config.timing_summary = parse_bool(Self::ENV_TIMING_SUMMARY, value)?;
        }
        if let Some(value) = lookup(Self::ENV_OUTPUT_DIR) {
            config.output_directory = Some(PathBuf::from(value));
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolve an output path against [`output_directory`](Self::output_directory).
    pub fn resolve_output(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.output_directory {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}

// ── InitConfig ─────────────────────────────────────────────────────

/// A script pipeline declared under `catalyst/scripts`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptSpec {
    /// Pipeline name: the child key, or the file stem for list entries.
    pub name: String,
    /// Script file to load.
    pub filename: String,
    /// Arguments passed to the script's initialize hook.
    pub args: Vec<String>,
}

/// What kind of pipeline a `catalyst/pipelines` entry declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineSpecKind {
    /// `type: "io"`.
    Io {
        /// Output filename template.
        filename: String,
        /// Channel whose producer is written.
        channel: String,
    },
    /// Any other `type`; not built by the engine.
    Other(String),
}

/// A pipeline declared under `catalyst/pipelines`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Pipeline name: the child key, or `<type>_<index>` for list entries.
    pub name: String,
    /// Declared kind.
    pub kind: PipelineSpecKind,
}

/// Typed view of a validated `initialize` node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitConfig {
    /// Script pipelines in declaration order.
    pub scripts: Vec<ScriptSpec>,
    /// Declared pipelines in declaration order.
    pub pipelines: Vec<PipelineSpec>,
    /// Proxy definition files.
    pub proxies: Vec<String>,
    /// Communicator handle forwarded by the host.
    pub mpi_comm: Option<i64>,
}

impl InitConfig {
    /// Read the configuration from a `catalyst` node that passed
    /// `initialize` validation. Malformed entries are ignored.
    pub fn from_node(node: &Node) -> Self {
        let mut config = Self {
            mpi_comm: node.child("mpi_comm").and_then(Node::as_i64),
            ..Self::default()
        };

        if let Some(scripts) = node.child("scripts") {
            let keyed = scripts.is_object();
            for (key, child) in scripts.entries() {
                let (filename, args) = match child {
                    Node::String(f) => (f.clone(), Vec::new()),
                    Node::Object(_) => {
                        let Some(f) = child.child("filename").and_then(Node::as_str) else {
                            continue;
                        };
                        (f.to_string(), string_list(child.child("args")))
                    }
                    _ => continue,
                };
                let name = if keyed {
                    key.into_owned()
                } else {
                    file_stem(&filename)
                };
                config.scripts.push(ScriptSpec {
                    name,
                    filename,
                    args,
                });
            }
        }

        if let Some(pipelines) = node.child("pipelines") {
            let keyed = pipelines.is_object();
            for (key, child) in pipelines.entries() {
                let Some(ty) = child.child("type").and_then(Node::as_str) else {
                    continue;
                };
                let kind = if ty == "io" {
                    let field = |k| {
                        child
                            .child(k)
                            .and_then(Node::as_str)
                            .unwrap_or_default()
                            .to_string()
                    };
                    PipelineSpecKind::Io {
                        filename: field("filename"),
                        channel: field("channel"),
                    }
                } else {
                    PipelineSpecKind::Other(ty.to_string())
                };
                let name = if keyed {
                    key.into_owned()
                } else {
                    format!("{ty}_{key}")
                };
                config.pipelines.push(PipelineSpec { name, kind });
            }
        }

        if let Some(proxies) = node.child("proxies") {
            for (_, child) in proxies.entries() {
                let filename = match child {
                    Node::String(f) => Some(f.as_str()),
                    Node::Object(_) => child.child("filename").and_then(Node::as_str),
                    _ => None,
                };
                config.proxies.extend(filename.map(str::to_string));
            }
        }
        config
    }
}

fn string_list(node: Option<&Node>) -> Vec<String> {
    node.and_then(Node::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Node::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let c = EngineConfig::default();
        assert!(c.validate().is_ok());
        assert!(c.is_root());
        assert_eq!(c.failure_reporting, FailureReporting::Cumulative);
    }

    #[test]
    fn env_overlay() {
        let c = EngineConfig::from_lookup(lookup(&[
            ("INSITU_RANK", "3"),
            ("INSITU_FAILURE_REPORTING", "per-step"),
            ("INSITU_TIMING_SUMMARY", "yes"),
            ("INSITU_OUTPUT_DIR", "/tmp/out"),
        ]))
        .unwrap();
        assert_eq!(c.rank, 3);
        assert!(!c.is_root());
        assert_eq!(c.failure_reporting, FailureReporting::PerStep);
        assert!(c.timing_summary);
        assert_eq!(c.output_directory, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn malformed_env_values_are_errors() {
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[("INSITU_RANK", "-1")])),
            Err(ConfigError::InvalidRank { value: "-1".into() })
        );
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("INSITU_FAILURE_REPORTING", "sometimes")])),
            Err(ConfigError::InvalidFailureReporting { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("INSITU_TIMING_SUMMARY", "maybe")])),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[("INSITU_OUTPUT_DIR", "")])),
            Err(ConfigError::EmptyOutputDirectory)
        );
    }

    #[test]
    fn relative_outputs_resolve_under_output_directory() {
        let c = EngineConfig {
            output_directory: Some(PathBuf::from("/data")),
            ..EngineConfig::default()
        };
        assert_eq!(c.resolve_output("a/b.json"), PathBuf::from("/data/a/b.json"));
        assert_eq!(c.resolve_output("/abs.json"), PathBuf::from("/abs.json"));
        assert_eq!(EngineConfig::default().resolve_output("x.json"), PathBuf::from("x.json"));
    }

    #[test]
    fn init_config_names_keyed_and_listed_entries() {
        let node = Node::from_json_str(
            r#"{
                "scripts": {"viz": {"filename": "scripts/viz.rhai", "args": ["--a", "b"]}},
                "pipelines": [
                    {"type": "io", "filename": "out_{timestep}.json", "channel": "grid"},
                    {"type": "render"}
                ],
                "proxies": ["p.xml", {"filename": "q.xml"}],
                "mpi_comm": 12
            }"#,
        )
        .unwrap();
        let c = InitConfig::from_node(&node);
        assert_eq!(
            c.scripts,
            vec![ScriptSpec {
                name: "viz".into(),
                filename: "scripts/viz.rhai".into(),
                args: vec!["--a".into(), "b".into()],
            }]
        );
        assert_eq!(c.pipelines[0].name, "io_0");
        assert_eq!(
            c.pipelines[0].kind,
            PipelineSpecKind::Io {
                filename: "out_{timestep}.json".into(),
                channel: "grid".into(),
            }
        );
        assert_eq!(c.pipelines[1].name, "render_1");
        assert_eq!(c.pipelines[1].kind, PipelineSpecKind::Other("render".into()));
        assert_eq!(c.proxies, vec!["p.xml".to_string(), "q.xml".to_string()]);
        assert_eq!(c.mpi_comm, Some(12));
    }

    #[test]
    fn listed_scripts_are_named_by_file_stem() {
        let node = Node::from_json_str(r#"{"scripts": ["dir/slice.rhai", "contour.rhai"]}"#).unwrap();
        let names: Vec<_> = InitConfig::from_node(&node)
            .scripts
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["slice", "contour"]);
    }

    #[test]
    fn null_node_is_empty_config() {
        assert_eq!(InitConfig::from_node(&Node::Null), InitConfig::default());
    }
}
