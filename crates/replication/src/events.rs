//! Notifications flowing from storage server records to the registry.

use corelib::ServerId;
use tokio::sync::mpsc;

/// Health notification raised by a server record or its poller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// A metrics poll finished. `available` is false when the stored outcome
    /// is a failure.
    MetricsUpdated { server_id: ServerId, available: bool },
    /// The version lag flag flipped.
    VersionLagChanged { server_id: ServerId, too_far_behind: bool },
    /// The server was flagged as running the wrong storage engine.
    WrongStoreType { server_id: ServerId },
}

/// Non-owning link from a server record back to its registry.
///
/// Holds only a weak sender: a record never keeps its registry's event queue
/// alive, and events sent after the registry is gone are discarded.
#[derive(Clone, Debug)]
pub struct RegistryLink {
    tx: mpsc::WeakUnboundedSender<ServerEvent>,
}

impl RegistryLink {
    pub(crate) fn new(tx: &mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// A link that leads nowhere, for records living outside a registry.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx: tx.downgrade() }
    }

    pub(crate) fn notify(&self, event: ServerEvent) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(event);
        }
    }

    /// Whether the registry on the other end still exists.
    pub fn is_attached(&self) -> bool {
        self.tx.upgrade().is_some()
    }
}
