//! Logging bootstrap.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and a fmt
//! layer writing to stderr. The filter comes from `INSITU_LOG` when set;
//! otherwise the root rank logs at `warn,insitu=info` and satellite ranks
//! at `error`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "INSITU_LOG";

/// Default directives on the root rank.
pub const ROOT_FILTER: &str = "warn,insitu=info";

/// Default directives on satellite ranks.
pub const SATELLITE_FILTER: &str = "error";

/// Default directives for `rank`.
pub fn default_directives(rank: u32) -> &'static str {
    if rank == 0 {
        ROOT_FILTER
    } else {
        SATELLITE_FILTER
    }
}

/// Filter from `INSITU_LOG`, falling back to the rank's defaults when the
/// variable is unset or unparsable.
pub fn filter(rank: u32) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives(rank)))
}

/// Install the global subscriber.
///
/// Returns false if a subscriber was already installed, by an earlier call
/// or by the host; that subscriber stays in place.
pub fn init(rank: u32) -> bool {
    tracing_subscriber::registry()
        .with(filter(rank))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satellites_default_to_errors_only() {
        assert_eq!(default_directives(0), ROOT_FILTER);
        assert_eq!(default_directives(3), SATELLITE_FILTER);
    }

    #[test]
    fn second_init_is_harmless() {
        init(0);
        assert!(!init(0));
    }
}
