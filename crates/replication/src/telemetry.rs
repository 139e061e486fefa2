//! Logging setup for processes embedding the team collection.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::TeamConfig;
use crate::error::{ReplicationError, Result};

/// Install the global tracing subscriber.
///
/// Events are filtered by the config's `rust_log` directives and written to
/// stdout. Fails if the directives do not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TeamConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.rust_log).map_err(|err| ReplicationError::Telemetry(err.to_string()))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|err| ReplicationError::Telemetry(err.to_string()))
}
