//! Error types for signal channels.

/// Result type alias for signal channels.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors returned while waiting on a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// The signalling side was dropped and the awaited event can never happen.
    #[error("signal source dropped")]
    SourceDropped,
}
