//! Metrics polling for one storage server.
//!
//! Each tracked server runs one poller task. It is the only writer of the
//! server's metrics snapshot, so polls of one server never overlap. The task
//! is bound to its `StorageServerRecord`: tearing the record down cancels it
//! and waits for it to finish.

use std::sync::Arc;
use std::time::Duration;

use corelib::{MetricsError, MetricsOutcome, StorageServerTransport};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::TeamConfig;
use crate::events::{RegistryLink, ServerEvent};
use crate::health::ServerHealth;

/// Issue one metrics request and store its outcome.
///
/// Success and failure both replace the previous snapshot. A request that
/// does not answer within `timeout` is stored as `MetricsError::Timeout`.
/// There is no retry; the next poll is the retry.
pub async fn update_server_metrics(
    health: &ServerHealth,
    transport: &dyn StorageServerTransport,
    timeout: Duration,
) -> MetricsOutcome {
    let server_id = health.server_id();
    let interface = health.interface().interface;
    let outcome = match tokio::time::timeout(timeout, transport.get_storage_metrics(&interface)).await {
        Ok(res) => res,
        Err(_) => Err(MetricsError::Timeout),
    };

    let label = match &outcome {
        Ok(reply) => {
            trace!(server_id = %server_id, version_lag = reply.version_lag, "storage metrics updated");
            "ok"
        }
        Err(err) => {
            warn!(server_id = %server_id, address = %interface.address, error = %err, "storage metrics unavailable");
            "error"
        }
    };
    metrics::counter!("team_collection_metrics_polls_total", "outcome" => label).increment(1);

    if !health.store_metrics(outcome.clone()) {
        trace!(server_id = %server_id, "discarding metrics of removed server");
    }
    outcome
}

/// Background task refreshing one server's metrics at a fixed interval.
pub(crate) struct MetricsPoller {
    health: Arc<ServerHealth>,
    transport: Arc<dyn StorageServerTransport>,
    config: Arc<TeamConfig>,
    link: RegistryLink,
}

impl MetricsPoller {
    pub(crate) fn new(
        health: Arc<ServerHealth>,
        transport: Arc<dyn StorageServerTransport>,
        config: Arc<TeamConfig>,
        link: RegistryLink,
    ) -> Self {
        Self {
            health,
            transport,
            config,
            link,
        }
    }

    /// Spawn onto the current tokio runtime.
    pub(crate) fn spawn(self) -> MonitorHandle {
        MonitorHandle {
            handle: Some(tokio::spawn(self.run())),
        }
    }

    async fn run(self) {
        let server_id = self.health.server_id();
        let mut removed = self.health.on_removed();
        let timeout = self.config.metrics_request_timeout();
        debug!(server_id = %server_id, "metrics polling started");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = removed.wait() => break,
                outcome = update_server_metrics(&self.health, self.transport.as_ref(), timeout) => outcome,
            };
            self.link.notify(ServerEvent::MetricsUpdated {
                server_id,
                available: outcome.is_ok(),
            });
            if let (Ok(reply), true) = (&outcome, self.config.version_lag_check) {
                self.check_version_lag(reply.version_lag);
            }

            tokio::select! {
                biased;
                _ = removed.wait() => break,
                _ = self.health.woken() => trace!(server_id = %server_id, "metrics poller woken early"),
                _ = tokio::time::sleep(self.config.polling_interval()) => (),
            }
        }

        debug!(server_id = %server_id, "metrics polling stopped");
    }

    /// Maintain the version lag flag with hysteresis between the allowed and
    /// failure thresholds.
    fn check_version_lag(&self, version_lag: i64) {
        let server_id = self.health.server_id();
        let behind = self.health.is_version_too_far_behind();
        let flip_to = if !behind && version_lag > self.config.failure_version_lag {
            true
        } else if behind && version_lag < self.config.allowed_version_lag {
            false
        } else {
            return;
        };
        if !self.health.set_version_too_far_behind(flip_to) {
            return;
        }
        if flip_to {
            warn!(server_id = %server_id, version_lag, "storage server version too far behind");
        } else {
            info!(server_id = %server_id, version_lag, "storage server caught up");
        }
        self.link.notify(ServerEvent::VersionLagChanged {
            server_id,
            too_far_behind: flip_to,
        });
    }
}

/// Owning handle on a running poller. Dropping it aborts the task.
#[derive(Debug)]
pub(crate) struct MonitorHandle {
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Abort the task and wait until it has stopped. Nothing the task does
    /// is observable after this returns.
    pub(crate) async fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
