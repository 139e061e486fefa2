//! Error types for team bookkeeping.
//!
//! Structural invariant violations are not represented here: they panic.

use corelib::{MachineId, ServerId, TeamId};

/// Result type alias for the replication crate.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors returned by registry and team operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    #[error("unknown storage server {0}")]
    UnknownServer(ServerId),
    #[error("storage server {0} is already registered")]
    DuplicateServer(ServerId),
    #[error("unknown machine {0}")]
    UnknownMachine(MachineId),
    #[error("unknown team {0}")]
    UnknownTeam(TeamId),
    #[error("storage server {0} reports no zone id")]
    MissingZoneId(ServerId),
    #[error("interface belongs to server {actual}, expected {expected}")]
    InterfaceMismatch { expected: ServerId, actual: ServerId },
    #[error("invalid machine team: {0}")]
    InvalidMachineTeam(String),
    #[error("an equal machine team already exists: {0}")]
    DuplicateMachineTeam(TeamId),
    #[error("invalid server team: {0}")]
    InvalidServerTeam(String),
    #[error("an equal server team already exists: {0}")]
    DuplicateServerTeam(TeamId),
    #[error("team has {actual} members, expected {expected}")]
    InvalidTeamSize { expected: usize, actual: usize },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("error initializing tracing: {0}")]
    Telemetry(String),
}
