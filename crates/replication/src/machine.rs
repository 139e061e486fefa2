//! Machine records: the fault domain shared by co-located servers.

use corelib::{MachineId, ServerId};

use crate::server::StorageServerRecord;

/// The set of storage servers living on one machine.
///
/// Membership is kept symmetric with each server's machine back reference:
/// `add_server` and `remove_server` update both sides together. Breaking
/// the symmetry is a registry bug and panics.
#[derive(Debug, Clone)]
pub struct MachineRecord {
    machine_id: MachineId,
    servers: Vec<ServerId>,
}

impl MachineRecord {
    pub fn new(machine_id: MachineId) -> Self {
        Self {
            machine_id,
            servers: Vec::new(),
        }
    }

    pub fn machine_id(&self) -> &MachineId {
        &self.machine_id
    }

    pub fn servers(&self) -> &[ServerId] {
        &self.servers
    }

    pub fn contains(&self, server: ServerId) -> bool {
        self.servers.contains(&server)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Place a server on this machine.
    pub fn add_server(&mut self, server: &mut StorageServerRecord) {
        assert!(
            server.machine().is_none(),
            "server {} joining machine {} is still on machine {:?}",
            server.id(),
            self.machine_id,
            server.machine()
        );
        assert!(!self.contains(server.id()), "server {} already on machine {}", server.id(), self.machine_id);
        self.servers.push(server.id());
        server.set_machine(Some(self.machine_id.clone()));
    }

    /// Take a server off this machine, clearing its back reference.
    ///
    /// Returns `false` if the server was not here.
    pub fn remove_server(&mut self, server: &mut StorageServerRecord) -> bool {
        let Some(pos) = self.servers.iter().position(|id| *id == server.id()) else {
            return false;
        };
        assert_eq!(
            server.machine(),
            Some(&self.machine_id),
            "server {} listed on machine {} points elsewhere",
            server.id(),
            self.machine_id
        );
        self.servers.remove(pos);
        server.set_machine(None);
        true
    }
}
