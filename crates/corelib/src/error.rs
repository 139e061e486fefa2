//! Error types for the core library.

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Unknown storage engine name
    #[error("invalid store type: {0}")]
    InvalidStoreType(String),
    /// Unknown process class name
    #[error("invalid process class: {0}")]
    InvalidProcessClass(String),
}
