//! Fixtures shared by the registry integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use corelib::{
    GetStorageMetricsReply, KeyValueStoreType, LocalityData, MetricsError, ProcessClass, ServerId,
    StorageServerInterface, StorageServerTransport,
};
use replication::{TeamConfig, TeamRegistry};

/// Transport reporting a configurable version lag for every server.
#[derive(Default)]
pub struct LagTransport {
    pub version_lag: AtomicI64,
    pub calls: AtomicUsize,
}

impl LagTransport {
    pub fn set_lag(&self, lag: i64) {
        self.version_lag.store(lag, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageServerTransport for LagTransport {
    async fn get_storage_metrics(
        &self,
        _interface: &StorageServerInterface,
    ) -> Result<GetStorageMetricsReply, MetricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GetStorageMetricsReply {
            version_lag: self.version_lag.load(Ordering::SeqCst),
            ..GetStorageMetricsReply::default()
        })
    }
}

pub fn config() -> Arc<TeamConfig> {
    Arc::new(TeamConfig {
        team_size: 3,
        store_type: KeyValueStoreType::SsdBTreeV2,
        server_metrics_polling_interval_ms: 1_000,
        failure_version_lag: 1_000,
        allowed_version_lag: 500,
        ..TeamConfig::default()
    })
}

pub fn registry() -> (TeamRegistry, Arc<LagTransport>) {
    let transport = Arc::new(LagTransport::default());
    (TeamRegistry::new(config(), transport.clone()), transport)
}

pub fn interface(id: u128, zone: &str) -> StorageServerInterface {
    let address: SocketAddr = ([10, 1, 0, (id % 250) as u8 + 1], 4500).into();
    StorageServerInterface::new(ServerId(id), address, LocalityData::with_zone(zone))
}

/// Add a storage server running the configured engine.
pub fn add(registry: &mut TeamRegistry, id: u128, zone: &str) -> ServerId {
    registry
        .add_server(interface(id, zone), ProcessClass::Storage, KeyValueStoreType::SsdBTreeV2, true)
        .expect("server should be added")
}
