//! Per-call outcome of [`Dispatcher::execute`](crate::dispatcher::Dispatcher::execute).

use std::fmt;

use smallvec::SmallVec;

/// A channel that was not refreshed this step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedChannel {
    /// Channel name.
    pub name: String,
    /// Why the channel was skipped.
    pub reason: String,
}

/// What one execute call did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecuteReport {
    /// Effective timestep.
    pub timestep: i64,
    /// Effective simulation time.
    pub time: f64,
    /// Channels whose producers were refreshed, in declaration order.
    pub refreshed: Vec<String>,
    /// Channels skipped, in declaration order.
    pub skipped: Vec<SkippedChannel>,
    /// Steering targets applied before pipelines ran.
    pub steering_applied: usize,
    /// Pipelines whose execute hook ran and succeeded.
    pub executed: SmallVec<[String; 4]>,
    /// Pipelines counted as failed by the failure scan.
    pub failed_pipelines: SmallVec<[String; 4]>,
    /// True if the step is reported as failed.
    pub failed: bool,
}

impl ExecuteReport {
    /// True if `channel` was refreshed.
    pub fn was_refreshed(&self, channel: &str) -> bool {
        self.refreshed.iter().any(|c| c == channel)
    }

    /// True if `channel` was skipped.
    pub fn was_skipped(&self, channel: &str) -> bool {
        self.skipped.iter().any(|c| c.name == channel)
    }

    /// True if `pipeline` executed successfully this call.
    pub fn was_executed(&self, pipeline: &str) -> bool {
        self.executed.iter().any(|p| p == pipeline)
    }
}

impl fmt::Display for ExecuteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timestep {}: {} channel(s) refreshed, {} skipped, {} pipeline(s) executed",
            self.timestep,
            self.refreshed.len(),
            self.skipped.len(),
            self.executed.len()
        )?;
        if self.failed {
            write!(f, ", failed: {}", self.failed_pipelines.join(", "))?;
        }
        Ok(())
    }
}
