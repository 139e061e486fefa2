//! Storage metrics reported by storage servers.

/// Load figures for the data held by one storage server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageMetrics {
    pub bytes: i64,
    pub bytes_per_ksecond: i64,
    pub ios_per_ksecond: i64,
    pub bytes_read_per_ksecond: i64,
}

/// A storage server's answer to a metrics request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetStorageMetricsReply {
    pub load: StorageMetrics,
    pub available: StorageMetrics,
    pub capacity: StorageMetrics,
    pub bytes_input_rate: f64,
    /// Versions between the server's applied version and the latest
    /// committed version.
    pub version_lag: i64,
}

/// Structured failure of a metrics request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    /// No reply before the request deadline
    #[error("metrics request timed out")]
    Timeout,
    /// The endpoint could not be reached
    #[error("storage server unreachable: {0}")]
    Unreachable(String),
    /// The server answered with an error
    #[error("metrics request failed: {0}")]
    Failed(String),
}

/// Outcome of the last metrics request. A failure is a valid stored value.
pub type MetricsOutcome = Result<GetStorageMetricsReply, MetricsError>;
