//! Server teams: the concrete replica groups.

use std::fmt;

use corelib::{ServerId, TeamId};

/// A set of storage servers, one per machine of its machine team.
///
/// Like machine teams, equality only looks at the sorted member ids.
#[derive(Debug, Clone)]
pub struct ServerTeam {
    id: TeamId,
    servers: Vec<ServerId>,
    machine_team: TeamId,
}

impl ServerTeam {
    pub fn new(mut servers: Vec<ServerId>, machine_team: TeamId) -> Self {
        servers.sort();
        Self {
            id: TeamId::random(),
            servers,
            machine_team,
        }
    }

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.servers.len()
    }

    /// Member ids in sorted order.
    pub fn servers(&self) -> &[ServerId] {
        &self.servers
    }

    /// The machine team this team was built from.
    pub fn machine_team(&self) -> TeamId {
        self.machine_team
    }

    pub fn contains(&self, server: ServerId) -> bool {
        self.servers.binary_search(&server).is_ok()
    }

    pub fn server_ids_str(&self) -> String {
        if self.servers.is_empty() {
            return "[unset]".to_string();
        }
        self.servers.iter().map(ServerId::to_string).collect::<Vec<_>>().join(" ")
    }
}

impl PartialEq for ServerTeam {
    fn eq(&self, other: &Self) -> bool {
        self.servers == other.servers
    }
}

impl Eq for ServerTeam {}

impl fmt::Display for ServerTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerTeam(id={}, servers=[{}])", self.id, self.server_ids_str())
    }
}
