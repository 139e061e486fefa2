//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use corelib::{
    GetStorageMetricsReply, LocalityData, MetricsError, MetricsOutcome, ProcessClass, ServerId, StorageServerInterface,
    StorageServerTransport,
};
use parking_lot::Mutex;

use crate::health::InterfaceInfo;

pub fn interface(id: u128, zone: &str) -> StorageServerInterface {
    let address: SocketAddr = ([10, 0, 0, (id % 250) as u8 + 1], 4500).into();
    StorageServerInterface::new(ServerId(id), address, LocalityData::with_zone(zone))
}

pub fn info(id: u128, zone: &str) -> InterfaceInfo {
    InterfaceInfo {
        interface: interface(id, zone),
        process_class: ProcessClass::Storage,
    }
}

pub fn reply(version_lag: i64) -> GetStorageMetricsReply {
    GetStorageMetricsReply {
        version_lag,
        ..GetStorageMetricsReply::default()
    }
}

/// Transport answering from a script, then repeating a fallback outcome.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<MetricsOutcome>>,
    fallback: Mutex<MetricsOutcome>,
    hang: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(fallback: MetricsOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            hang: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, outcome: MetricsOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn set_fallback(&self, outcome: MetricsOutcome) {
        *self.fallback.lock() = outcome;
    }

    /// Make every following request hang forever.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageServerTransport for ScriptedTransport {
    async fn get_storage_metrics(
        &self,
        _interface: &StorageServerInterface,
    ) -> Result<GetStorageMetricsReply, MetricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().clone())
    }
}
