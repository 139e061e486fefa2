//! Identity of storage servers, machines, and teams.
//!
//! Identifiers are compact and cheap to compare and hash. Heavy mutable state
//! (health, metrics, membership) lives in the replication crate.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::Error;

/// Globally unique identifier of a storage server process.
///
/// Newtype over `u128` so comparisons and hashing are very fast while giving
/// plenty of space for uniqueness.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ServerId(pub u128);

impl ServerId {
    /// Generate a fresh random id.
    pub fn random() -> Self {
        ServerId(rand::random())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Identifier of a team, either a machine team or a server team.
///
/// Team ids are random and carry no meaning beyond log correlation.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TeamId(pub u128);

impl TeamId {
    pub fn random() -> Self {
        TeamId(rand::random())
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Identifier of a machine, the fault domain that co-located servers share.
///
/// Machine ids are the zone ids reported in server localities, so they are
/// opaque strings ordered bytewise.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        MachineId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MachineId {
    fn from(id: &str) -> Self {
        MachineId::new(id)
    }
}

/// Placement labels reported by a storage process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalityData {
    /// Zone the process runs in. Used as the machine identity.
    pub zone_id: Option<String>,
    /// Physical machine label, if different from the zone.
    pub machine_id: Option<String>,
    /// Data center label for topology-aware replication.
    pub dc_id: Option<String>,
    /// Data hall label.
    pub data_hall_id: Option<String>,
}

impl LocalityData {
    /// Locality with only a zone set.
    pub fn with_zone(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            ..Self::default()
        }
    }

    /// The machine this locality places a process on, if known.
    pub fn machine(&self) -> Option<MachineId> {
        self.zone_id.as_deref().map(MachineId::new)
    }
}

/// The network interface of a storage server as last observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageServerInterface {
    pub id: ServerId,
    pub address: SocketAddr,
    pub locality: LocalityData,
}

impl StorageServerInterface {
    pub fn new(id: ServerId, address: SocketAddr, locality: LocalityData) -> Self {
        Self { id, address, locality }
    }
}

/// Role hint assigned to the process hosting a storage server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ProcessClass {
    #[default]
    Unset,
    Storage,
    Transaction,
    Log,
    Stateless,
    Tester,
}

impl ProcessClass {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessClass::Unset => "unset",
            ProcessClass::Storage => "storage",
            ProcessClass::Transaction => "transaction",
            ProcessClass::Log => "log",
            ProcessClass::Stateless => "stateless",
            ProcessClass::Tester => "test",
        }
    }
}

impl fmt::Display for ProcessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProcessClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(ProcessClass::Unset),
            "storage" => Ok(ProcessClass::Storage),
            "transaction" => Ok(ProcessClass::Transaction),
            "log" => Ok(ProcessClass::Log),
            "stateless" => Ok(ProcessClass::Stateless),
            "test" => Ok(ProcessClass::Tester),
            other => Err(Error::InvalidProcessClass(other.to_string())),
        }
    }
}
