//! Storage server and replication team bookkeeping.
//!
//! This crate tracks the pieces data distribution places replicas on:
//! - Per-server health state and the background metrics poller
//! - Machines grouping co-located servers into fault domains
//! - Machine teams: deduplicated combinations of machines
//! - Server teams: one server per machine of a machine team
//!
//! `TeamRegistry` owns all of them and is the only thing that mutates the
//! relationships between them. Choosing which teams to build is left to the
//! placement policy sitting on top of the registry.

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod machine;
pub mod machine_team;
pub mod monitor;
pub mod registry;
pub mod server;
pub mod server_team;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use config::TeamConfig;
pub use error::{ReplicationError, Result};
pub use events::{RegistryLink, ServerEvent};
pub use health::{Disposition, InterfaceInfo, ServerHealth};
pub use machine::MachineRecord;
pub use machine_team::MachineTeam;
pub use monitor::update_server_metrics;
pub use registry::TeamRegistry;
pub use server::StorageServerRecord;
pub use server_team::ServerTeam;
