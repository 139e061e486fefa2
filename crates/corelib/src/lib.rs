//! Core library for storage server team bookkeeping.
//!
//! This crate provides the value types shared by the data distribution layer:
//! - Server, machine, and team identifiers
//! - Storage server interfaces and locality
//! - Storage engine types
//! - Storage metrics replies
//! - The transport seam used to reach storage servers

pub mod error;
pub mod metrics;
pub mod network;
pub mod node;
pub mod store;

pub use error::{Error, Result};
pub use metrics::{GetStorageMetricsReply, MetricsError, MetricsOutcome, StorageMetrics};
pub use network::StorageServerTransport;
pub use node::{LocalityData, MachineId, ProcessClass, ServerId, StorageServerInterface, TeamId};
pub use store::KeyValueStoreType;
