//! Runtime configuration.

use std::time::Duration;

use corelib::KeyValueStoreType;
use serde::Deserialize;

use crate::error::{ReplicationError, Result};

/// Runtime configuration data.
///
/// Every field has a default, so an empty environment yields a usable config.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Logging directives in `EnvFilter` syntax.
    pub rust_log: String,
    /// Number of machines in a machine team, and of servers in a server team.
    pub team_size: usize,
    /// The storage engine the cluster is configured to use.
    pub store_type: KeyValueStoreType,
    /// Delay between two metrics polls of one server.
    pub server_metrics_polling_interval_ms: u64,
    /// Deadline for a single metrics request.
    pub metrics_request_timeout_ms: u64,
    /// Whether the poller maintains the version lag flag from polled metrics.
    pub version_lag_check: bool,
    /// Lag above which a server is flagged as too far behind.
    pub failure_version_lag: i64,
    /// Lag below which the flag is cleared again.
    pub allowed_version_lag: i64,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            rust_log: "info".to_string(),
            team_size: 3,
            store_type: KeyValueStoreType::SsdBTreeV2,
            server_metrics_polling_interval_ms: 5_000,
            metrics_request_timeout_ms: 2_000,
            version_lag_check: true,
            failure_version_lag: 250_000_000,
            allowed_version_lag: 200_000_000,
        }
    }
}

impl TeamConfig {
    /// Prefix of every environment variable read by `from_env`.
    pub const ENV_PREFIX: &'static str = "TEAM_COLLECTION_";

    /// Build the config from the process environment.
    pub fn from_env() -> Result<Self> {
        let config: TeamConfig = envy::prefixed(Self::ENV_PREFIX)
            .from_env()
            .map_err(|err| ReplicationError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the config from explicit key/value pairs, using the same names as
    /// the environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: TeamConfig = envy::prefixed(Self::ENV_PREFIX)
            .from_iter(pairs)
            .map_err(|err| ReplicationError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.team_size == 0 {
            return Err(ReplicationError::Config("team_size must be at least 1".into()));
        }
        if self.server_metrics_polling_interval_ms == 0 {
            return Err(ReplicationError::Config("server_metrics_polling_interval_ms must be positive".into()));
        }
        if self.allowed_version_lag >= self.failure_version_lag {
            return Err(ReplicationError::Config(format!(
                "allowed_version_lag ({}) must be below failure_version_lag ({})",
                self.allowed_version_lag, self.failure_version_lag
            )));
        }
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.server_metrics_polling_interval_ms)
    }

    pub fn metrics_request_timeout(&self) -> Duration {
        Duration::from_millis(self.metrics_request_timeout_ms)
    }
}
