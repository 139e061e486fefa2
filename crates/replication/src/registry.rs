//! The team registry.
//!
//! The registry owns every server, machine, machine team, and server team,
//! keyed by id. It is the only place that mutates relationships between
//! them, from a single owner. Which teams to build is decided by the caller;
//! the registry records the decision and keeps the graph consistent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use corelib::{
    KeyValueStoreType, MachineId, ProcessClass, ServerId, StorageServerInterface, StorageServerTransport, TeamId,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::TeamConfig;
use crate::error::{ReplicationError, Result};
use crate::events::{RegistryLink, ServerEvent};
use crate::health::InterfaceInfo;
use crate::machine::MachineRecord;
use crate::machine_team::MachineTeam;
use crate::server::StorageServerRecord;
use crate::server_team::ServerTeam;

/// Owner of the server/machine/team graph.
pub struct TeamRegistry {
    config: Arc<TeamConfig>,
    transport: Arc<dyn StorageServerTransport>,

    servers: HashMap<ServerId, StorageServerRecord>,
    machines: BTreeMap<MachineId, MachineRecord>,
    machine_teams: HashMap<TeamId, MachineTeam>,
    server_teams: HashMap<TeamId, ServerTeam>,
    /// Servers whose version lag flag is set, as last seen in events.
    lagging_servers: HashSet<ServerId>,

    events_tx: mpsc::UnboundedSender<ServerEvent>,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TeamRegistry {
    pub fn new(config: Arc<TeamConfig>, transport: Arc<dyn StorageServerTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            servers: HashMap::new(),
            machines: BTreeMap::new(),
            machine_teams: HashMap::new(),
            server_teams: HashMap::new(),
            lagging_servers: HashSet::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn config(&self) -> &Arc<TeamConfig> {
        &self.config
    }

    /// Start tracking a newly observed storage server.
    ///
    /// The server joins the machine named by its locality zone, creating the
    /// machine if needed, and starts its metrics poller. Must be called within
    /// a tokio runtime.
    pub fn add_server(
        &mut self,
        interface: StorageServerInterface,
        process_class: ProcessClass,
        store_type: KeyValueStoreType,
        in_desired_dc: bool,
    ) -> Result<ServerId> {
        let server_id = interface.id;
        if self.servers.contains_key(&server_id) {
            return Err(ReplicationError::DuplicateServer(server_id));
        }
        let machine_id = interface.locality.machine().ok_or(ReplicationError::MissingZoneId(server_id))?;

        let mut record = StorageServerRecord::new(
            interface,
            process_class,
            store_type,
            in_desired_dc,
            RegistryLink::new(&self.events_tx),
        );
        self.machines
            .entry(machine_id.clone())
            .or_insert_with(|| MachineRecord::new(machine_id.clone()))
            .add_server(&mut record);
        record.start_metrics_polling(self.transport.clone(), self.config.clone());
        self.servers.insert(server_id, record);

        info!(server_id = %server_id, machine_id = %machine_id, store_type = %store_type, "storage server added");
        self.record_gauges();
        Ok(server_id)
    }

    /// Stop tracking a server.
    ///
    /// Its server teams are dissolved, it leaves its machine, and the machine
    /// is dropped if it was the last server there. The poller is cancelled
    /// before the removal trigger fires.
    pub async fn remove_server(&mut self, server_id: ServerId) -> Result<()> {
        let teams = self.server(server_id)?.teams().to_vec();
        for team_id in teams {
            self.drop_server_team(team_id);
        }
        let mut record = self
            .servers
            .remove(&server_id)
            .ok_or(ReplicationError::UnknownServer(server_id))?;
        self.leave_machine(&mut record);
        self.lagging_servers.remove(&server_id);
        record.teardown().await;

        info!(server_id = %server_id, "storage server removed");
        self.record_gauges();
        self.check_invariants();
        Ok(())
    }

    /// Replace a server with a new one running a different storage engine on
    /// the same endpoint. Returns the id of the new server.
    ///
    /// The new server is added before the old one is removed so the machine
    /// and its machine teams survive the swap. Server teams of the old server
    /// are dissolved.
    pub async fn replace_server_store_type(
        &mut self,
        server_id: ServerId,
        store_type: KeyValueStoreType,
    ) -> Result<ServerId> {
        let old = self.server(server_id)?;
        let mut interface = old.interface();
        let process_class = old.process_class();
        let in_desired_dc = old.health().in_desired_dc();

        interface.id = ServerId::random();
        let new_id = self.add_server(interface, process_class, store_type, in_desired_dc)?;
        self.remove_server(server_id).await?;

        info!(old_server_id = %server_id, new_server_id = %new_id, store_type = %store_type, "storage server replaced");
        Ok(new_id)
    }

    /// Record a newly observed interface for a server.
    ///
    /// Returns `false` if nothing changed. When the zone changed, the server
    /// moves to its new machine and its server teams are dissolved.
    pub fn update_server_interface(
        &mut self,
        server_id: ServerId,
        interface: StorageServerInterface,
        process_class: ProcessClass,
    ) -> Result<bool> {
        if interface.id != server_id {
            return Err(ReplicationError::InterfaceMismatch {
                expected: server_id,
                actual: interface.id,
            });
        }
        let new_machine = interface.locality.machine().ok_or(ReplicationError::MissingZoneId(server_id))?;
        let record = self.server(server_id)?;
        if !record.health().update_interface(InterfaceInfo {
            interface,
            process_class,
        }) {
            return Ok(false);
        }
        if record.machine() == Some(&new_machine) {
            debug!(server_id = %server_id, "storage server interface changed");
            return Ok(true);
        }

        let teams = record.teams().to_vec();
        for team_id in teams {
            self.drop_server_team(team_id);
        }
        let mut record = self
            .servers
            .remove(&server_id)
            .ok_or(ReplicationError::UnknownServer(server_id))?;
        let old_machine = record.machine().cloned();
        self.leave_machine(&mut record);
        self.machines
            .entry(new_machine.clone())
            .or_insert_with(|| MachineRecord::new(new_machine.clone()))
            .add_server(&mut record);
        self.servers.insert(server_id, record);

        info!(
            server_id = %server_id,
            old_machine_id = ?old_machine,
            machine_id = %new_machine,
            "storage server moved machines"
        );
        self.record_gauges();
        self.check_invariants();
        Ok(true)
    }

    /// Start tracking a machine team over the given machines.
    ///
    /// Fails if a team over the same machines exists already, in any order.
    pub fn add_machine_team(&mut self, machine_ids: &[MachineId]) -> Result<TeamId> {
        self.check_team_size(machine_ids.len())?;
        let members = machine_ids
            .iter()
            .map(|id| self.machines.get(id).ok_or_else(|| ReplicationError::UnknownMachine(id.clone())))
            .collect::<Result<Vec<_>>>()?;
        let team = MachineTeam::new(&members)?;
        if let Some(existing) = self.machine_teams.values().find(|existing| **existing == team) {
            return Err(ReplicationError::DuplicateMachineTeam(existing.id()));
        }

        let team_id = team.id();
        debug!(team_id = %team_id, machines = %team.machine_ids_str(), "machine team added");
        self.machine_teams.insert(team_id, team);
        self.record_gauges();
        Ok(team_id)
    }

    /// Find the machine team covering exactly these machines, in any order.
    pub fn find_machine_team(&self, machine_ids: &[MachineId]) -> Option<TeamId> {
        let mut sorted = machine_ids.to_vec();
        sorted.sort();
        self.machine_teams
            .values()
            .find(|team| team.machine_ids() == sorted.as_slice())
            .map(MachineTeam::id)
    }

    /// Stop tracking a machine team and every server team built on it.
    pub fn remove_machine_team(&mut self, team_id: TeamId) -> Result<()> {
        if !self.drop_machine_team(team_id) {
            return Err(ReplicationError::UnknownTeam(team_id));
        }
        self.record_gauges();
        Ok(())
    }

    /// Start tracking a server team.
    ///
    /// Members must live on distinct machines. The machine team over those
    /// machines is created if it does not exist yet.
    pub fn add_server_team(&mut self, server_ids: &[ServerId]) -> Result<TeamId> {
        self.check_team_size(server_ids.len())?;
        let mut machine_ids = Vec::with_capacity(server_ids.len());
        for server_id in server_ids {
            let record = self.server(*server_id)?;
            let machine = record
                .machine()
                .cloned()
                .ok_or_else(|| ReplicationError::InvalidServerTeam(format!("server {} has no machine", server_id)))?;
            if machine_ids.contains(&machine) {
                return Err(ReplicationError::InvalidServerTeam(format!("two members share machine {}", machine)));
            }
            machine_ids.push(machine);
        }

        let mut sorted = server_ids.to_vec();
        sorted.sort();
        if let Some(existing) = self.server_teams.values().find(|existing| existing.servers() == sorted.as_slice()) {
            return Err(ReplicationError::DuplicateServerTeam(existing.id()));
        }
        let machine_team = match self.find_machine_team(&machine_ids) {
            Some(id) => id,
            None => self.add_machine_team(&machine_ids)?,
        };
        let team = ServerTeam::new(sorted, machine_team);
        let team_id = team.id();
        for server_id in team.servers() {
            if let Some(record) = self.servers.get_mut(server_id) {
                record.add_team(team_id);
            }
        }

        debug!(
            team_id = %team_id,
            machine_team_id = %machine_team,
            servers = %team.server_ids_str(),
            "server team added"
        );
        self.server_teams.insert(team_id, team);
        Ok(team_id)
    }

    /// Stop tracking a server team.
    pub fn remove_server_team(&mut self, team_id: TeamId) -> Result<()> {
        if !self.drop_server_team(team_id) {
            return Err(ReplicationError::UnknownTeam(team_id));
        }
        Ok(())
    }

    /// Flag a server as running the wrong storage engine.
    pub fn mark_wrong_store_type(&mut self, server_id: ServerId) -> Result<bool> {
        Ok(self.server(server_id)?.mark_wrong_store_type())
    }

    /// Ids of servers whose engine differs from `config_store_type`, sorted.
    pub fn wrong_store_type_servers(&self, config_store_type: KeyValueStoreType) -> Vec<ServerId> {
        let mut wrong: Vec<ServerId> = self
            .servers
            .values()
            .filter(|record| !record.is_correct_store_type(config_store_type))
            .map(StorageServerRecord::id)
            .collect();
        wrong.sort();
        wrong
    }

    /// Flag every server whose engine differs from the configured one.
    /// Returns the ids of mismatched servers, sorted.
    pub fn check_store_types(&mut self) -> Vec<ServerId> {
        let wrong = self.wrong_store_type_servers(self.config.store_type);
        for server_id in &wrong {
            if let Some(record) = self.servers.get(server_id) {
                record.mark_wrong_store_type();
            }
        }
        wrong
    }

    /// Set or clear a server's version lag flag.
    pub fn set_version_too_far_behind(&mut self, server_id: ServerId, behind: bool) -> Result<bool> {
        let changed = self.server(server_id)?.set_version_too_far_behind(behind);
        if behind {
            self.lagging_servers.insert(server_id);
        } else {
            self.lagging_servers.remove(&server_id);
        }
        Ok(changed)
    }

    /// Drain pending server events, updating the lagging set.
    ///
    /// Events from servers removed in the meantime are dropped.
    pub fn poll_events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            let server_id = match &event {
                ServerEvent::MetricsUpdated { server_id, .. }
                | ServerEvent::VersionLagChanged { server_id, .. }
                | ServerEvent::WrongStoreType { server_id } => *server_id,
            };
            if !self.servers.contains_key(&server_id) {
                continue;
            }
            if let ServerEvent::VersionLagChanged { too_far_behind, .. } = &event {
                if *too_far_behind {
                    self.lagging_servers.insert(server_id);
                } else {
                    self.lagging_servers.remove(&server_id);
                }
            }
            events.push(event);
        }
        events
    }

    pub fn is_lagging(&self, server_id: ServerId) -> bool {
        self.lagging_servers.contains(&server_id)
    }

    pub fn lagging_server_count(&self) -> usize {
        self.lagging_servers.len()
    }

    pub fn server(&self, server_id: ServerId) -> Result<&StorageServerRecord> {
        self.servers.get(&server_id).ok_or(ReplicationError::UnknownServer(server_id))
    }

    pub fn servers(&self) -> impl Iterator<Item = &StorageServerRecord> {
        self.servers.values()
    }

    /// Ids of servers whose disposition is `Active`, sorted.
    pub fn healthy_servers(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self
            .servers
            .values()
            .filter(|record| record.health().is_healthy())
            .map(StorageServerRecord::id)
            .collect();
        ids.sort();
        ids
    }

    pub fn machine(&self, machine_id: &MachineId) -> Option<&MachineRecord> {
        self.machines.get(machine_id)
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineRecord> {
        self.machines.values()
    }

    pub fn machine_team(&self, team_id: TeamId) -> Option<&MachineTeam> {
        self.machine_teams.get(&team_id)
    }

    pub fn machine_teams(&self) -> impl Iterator<Item = &MachineTeam> {
        self.machine_teams.values()
    }

    pub fn server_team(&self, team_id: TeamId) -> Option<&ServerTeam> {
        self.server_teams.get(&team_id)
    }

    pub fn server_teams(&self) -> impl Iterator<Item = &ServerTeam> {
        self.server_teams.values()
    }

    /// Assert that the graph is consistent.
    ///
    /// # Panics
    ///
    /// On any asymmetric reference: a registry bug that would make placement
    /// decisions unsafe.
    pub fn check_invariants(&self) {
        for machine in self.machines.values() {
            assert!(!machine.is_empty(), "machine {} is tracked with no servers", machine.machine_id());
            for server_id in machine.servers() {
                let record = self
                    .servers
                    .get(server_id)
                    .unwrap_or_else(|| panic!("machine {} lists unknown server {}", machine.machine_id(), server_id));
                assert_eq!(
                    record.machine(),
                    Some(machine.machine_id()),
                    "server {} listed on machine {} points elsewhere",
                    server_id,
                    machine.machine_id()
                );
            }
        }
        for record in self.servers.values() {
            let machine_id = record
                .machine()
                .unwrap_or_else(|| panic!("server {} has no machine", record.id()));
            let machine = self
                .machines
                .get(machine_id)
                .unwrap_or_else(|| panic!("server {} points to unknown machine {}", record.id(), machine_id));
            assert!(machine.contains(record.id()), "machine {} does not list server {}", machine_id, record.id());
            for team_id in record.teams() {
                let team = self
                    .server_teams
                    .get(team_id)
                    .unwrap_or_else(|| panic!("server {} lists unknown team {}", record.id(), team_id));
                assert!(team.contains(record.id()), "team {} does not list server {}", team_id, record.id());
            }
        }
        for team in self.machine_teams.values() {
            team.size();
            for machine_id in team.machines() {
                assert!(
                    self.machines.contains_key(machine_id),
                    "machine team {} holds unknown machine {}",
                    team.id(),
                    machine_id
                );
            }
        }
        for team in self.server_teams.values() {
            assert!(
                self.machine_teams.contains_key(&team.machine_team()),
                "server team {} built on unknown machine team {}",
                team.id(),
                team.machine_team()
            );
            for server_id in team.servers() {
                let listed = self.servers.get(server_id).map_or(false, |record| record.teams().contains(&team.id()));
                assert!(listed, "server team {} member {} does not list it", team.id(), server_id);
            }
        }
    }

    /// Tear down every server, cancelling pollers before releasing anything.
    pub async fn shutdown(mut self) {
        let ids: Vec<ServerId> = self.servers.keys().copied().collect();
        for server_id in ids {
            if let Some(record) = self.servers.remove(&server_id) {
                record.teardown().await;
            }
        }
        debug!("team registry shut down");
    }

    fn check_team_size(&self, actual: usize) -> Result<()> {
        if actual != self.config.team_size {
            return Err(ReplicationError::InvalidTeamSize {
                expected: self.config.team_size,
                actual,
            });
        }
        Ok(())
    }

    /// Take a server off its machine, dropping the machine if it empties.
    fn leave_machine(&mut self, record: &mut StorageServerRecord) {
        let Some(machine_id) = record.machine().cloned() else {
            return;
        };
        let emptied = match self.machines.get_mut(&machine_id) {
            Some(machine) => {
                machine.remove_server(record);
                machine.is_empty()
            }
            None => panic!("server {} points to unknown machine {}", record.id(), machine_id),
        };
        if emptied {
            self.drop_machine(&machine_id);
        }
    }

    /// Forget a machine along with every machine team containing it.
    fn drop_machine(&mut self, machine_id: &MachineId) {
        self.machines.remove(machine_id);
        let doomed: Vec<TeamId> = self
            .machine_teams
            .values()
            .filter(|team| team.contains_machine(machine_id))
            .map(MachineTeam::id)
            .collect();
        for team_id in doomed {
            self.drop_machine_team(team_id);
        }
        info!(machine_id = %machine_id, "machine dropped");
    }

    fn drop_machine_team(&mut self, team_id: TeamId) -> bool {
        let Some(team) = self.machine_teams.remove(&team_id) else {
            return false;
        };
        let doomed: Vec<TeamId> = self
            .server_teams
            .values()
            .filter(|server_team| server_team.machine_team() == team_id)
            .map(ServerTeam::id)
            .collect();
        for server_team in doomed {
            self.drop_server_team(server_team);
        }
        debug!(team_id = %team_id, machines = %team.machine_ids_str(), "machine team removed");
        true
    }

    fn drop_server_team(&mut self, team_id: TeamId) -> bool {
        let Some(team) = self.server_teams.remove(&team_id) else {
            return false;
        };
        for server_id in team.servers() {
            if let Some(record) = self.servers.get_mut(server_id) {
                record.remove_team(team_id);
            }
        }
        debug!(team_id = %team_id, servers = %team.server_ids_str(), "server team removed");
        true
    }

    fn record_gauges(&self) {
        metrics::gauge!("team_collection_servers").set(self.servers.len() as f64);
        metrics::gauge!("team_collection_machines").set(self.machines.len() as f64);
        metrics::gauge!("team_collection_machine_teams").set(self.machine_teams.len() as f64);
    }
}

impl Drop for TeamRegistry {
    fn drop(&mut self) {
        if !self.servers.is_empty() {
            warn!(servers = self.servers.len(), "team registry dropped without shutdown");
        }
    }
}
