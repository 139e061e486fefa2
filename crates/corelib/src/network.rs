//! Transport seam between the bookkeeping layer and storage servers.
//!
//! The wire protocol lives elsewhere. This trait is the only call the
//! bookkeeping layer makes into it.

use async_trait::async_trait;

use crate::metrics::{GetStorageMetricsReply, MetricsError};
use crate::node::StorageServerInterface;

/// Request/response access to storage servers.
///
/// Implementations must be thread-safe as one transport is shared by every
/// server's poller.
#[async_trait]
pub trait StorageServerTransport: Send + Sync + 'static {
    /// Fetch a point-in-time metrics snapshot from the given interface.
    async fn get_storage_metrics(
        &self,
        interface: &StorageServerInterface,
    ) -> Result<GetStorageMetricsReply, MetricsError>;
}
