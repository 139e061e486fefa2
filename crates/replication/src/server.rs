//! Storage server records.
//!
//! A record is created when a storage process is first observed and lives
//! until the registry decides the server is gone or must be replaced. Its
//! store type is fixed for its whole life.

use std::sync::Arc;
use std::time::Duration;

use corelib::{
    KeyValueStoreType, MachineId, MetricsOutcome, ProcessClass, ServerId, StorageServerInterface,
    StorageServerTransport, TeamId,
};
use tracing::{debug, warn};

use crate::config::TeamConfig;
use crate::events::{RegistryLink, ServerEvent};
use crate::health::{Disposition, InterfaceInfo, ServerHealth};
use crate::monitor::{self, MetricsPoller, MonitorHandle};

/// Bookkeeping for one storage server.
#[derive(Debug)]
pub struct StorageServerRecord {
    id: ServerId,
    store_type: KeyValueStoreType,
    /// Back reference kept symmetric with `MachineRecord::servers`.
    machine: Option<MachineId>,
    /// Server teams this server is a member of.
    teams: Vec<TeamId>,
    health: Arc<ServerHealth>,
    link: RegistryLink,
    monitor: Option<MonitorHandle>,
}

impl StorageServerRecord {
    pub fn new(
        interface: StorageServerInterface,
        process_class: ProcessClass,
        store_type: KeyValueStoreType,
        in_desired_dc: bool,
        link: RegistryLink,
    ) -> Self {
        let id = interface.id;
        let info = InterfaceInfo {
            interface,
            process_class,
        };
        Self {
            id,
            store_type,
            machine: None,
            teams: Vec::new(),
            health: Arc::new(ServerHealth::new(info, in_desired_dc)),
            link,
            monitor: None,
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn store_type(&self) -> KeyValueStoreType {
        self.store_type
    }

    /// Whether this server runs the engine the cluster is configured for.
    pub fn is_correct_store_type(&self, config_store_type: KeyValueStoreType) -> bool {
        self.store_type == config_store_type
    }

    pub fn interface(&self) -> StorageServerInterface {
        self.health.interface().interface
    }

    pub fn process_class(&self) -> ProcessClass {
        self.health.interface().process_class
    }

    /// The machine this server's locality places it on.
    pub fn home_machine(&self) -> Option<MachineId> {
        self.health.interface().interface.locality.machine()
    }

    /// The machine record currently holding this server.
    pub fn machine(&self) -> Option<&MachineId> {
        self.machine.as_ref()
    }

    pub(crate) fn set_machine(&mut self, machine: Option<MachineId>) {
        self.machine = machine;
    }

    pub fn teams(&self) -> &[TeamId] {
        &self.teams
    }

    pub(crate) fn add_team(&mut self, team: TeamId) {
        if !self.teams.contains(&team) {
            self.teams.push(team);
        }
    }

    pub(crate) fn remove_team(&mut self, team: TeamId) -> bool {
        let before = self.teams.len();
        self.teams.retain(|id| *id != team);
        self.teams.len() != before
    }

    pub fn health(&self) -> &Arc<ServerHealth> {
        &self.health
    }

    pub fn disposition(&self) -> Disposition {
        self.health.disposition()
    }

    pub fn server_metrics(&self) -> Option<MetricsOutcome> {
        self.health.server_metrics()
    }

    /// Flag the server as running the wrong engine and tell the registry.
    pub fn mark_wrong_store_type(&self) -> bool {
        let changed = self.health.mark_wrong_store_type();
        if changed {
            warn!(server_id = %self.id, store_type = %self.store_type, "storage server has wrong store type");
            self.link.notify(ServerEvent::WrongStoreType { server_id: self.id });
        }
        changed
    }

    /// Set or clear the version lag flag and tell the registry if it flipped.
    pub fn set_version_too_far_behind(&self, behind: bool) -> bool {
        let changed = self.health.set_version_too_far_behind(behind);
        if changed {
            self.link.notify(ServerEvent::VersionLagChanged {
                server_id: self.id,
                too_far_behind: behind,
            });
        }
        changed
    }

    /// Poll metrics once, outside of the background poller.
    pub async fn update_server_metrics(
        &self,
        transport: &dyn StorageServerTransport,
        timeout: Duration,
    ) -> MetricsOutcome {
        monitor::update_server_metrics(&self.health, transport, timeout).await
    }

    /// Start the background metrics poller. Does nothing if it is running or
    /// the server is removed. Must be called within a tokio runtime.
    pub fn start_metrics_polling(&mut self, transport: Arc<dyn StorageServerTransport>, config: Arc<TeamConfig>) {
        if self.monitor.is_some() || self.health.is_removed() {
            return;
        }
        let poller = MetricsPoller::new(self.health.clone(), transport, config, self.link.clone());
        self.monitor = Some(poller.spawn());
    }

    pub fn is_polling(&self) -> bool {
        self.monitor.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Stop the background poller and wait for it to finish.
    pub async fn stop_metrics_polling(&mut self) {
        if let Some(handle) = self.monitor.take() {
            handle.cancel().await;
        }
    }

    /// Cancel the poller, then fire the removal trigger.
    pub(crate) async fn teardown(mut self) {
        self.stop_metrics_polling().await;
        if self.health.fire_removed() {
            debug!(server_id = %self.id, "storage server removed");
        }
    }
}

impl Drop for StorageServerRecord {
    fn drop(&mut self) {
        // Freeze before aborting the poller.
        self.health.fire_removed();
        self.monitor.take();
    }
}
