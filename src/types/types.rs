use thiserror::Error;

/// Configuration for an [`LruCache`](crate::cache::LruCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of resident entries (must be non-zero)
    pub capacity: usize,

    /// Entries evicted from the cold end when `put` hits capacity (default: 1)
    pub evict_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            evict_batch: 1,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the given capacity and single-entry eviction
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

/// Failure reported by a cache release callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ReleaseError {
    pub message: String,
}

impl ReleaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur in the translation layer
#[derive(Error, Debug)]
pub enum FtlError {
    #[error("No free page left in any segment")]
    OutOfSpace,

    #[error("Logical page number overflow (lpn: {lpn}, capacity: {capacity})")]
    OutOfRange { lpn: u64, capacity: u64 },

    #[error("Memory allocation failed")]
    AllocationFailure,

    #[error("Release callback failed for key {key}: {source}")]
    CallbackFailure {
        key: u64,
        #[source]
        source: ReleaseError,
    },

    #[error("Invalid device geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("Cache capacity must be non-zero")]
    InvalidCapacity,
}

pub type Result<T> = std::result::Result<T, FtlError>;
