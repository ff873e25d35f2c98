use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the response cache.
pub enum CacheError {
    /// Value could not be serialized or deserialized.
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Error message.
        reason: String,
    },

    /// Deflate stream could not be produced or read.
    #[error("compression failed: {reason}")]
    Compression {
        /// Error message.
        reason: String,
    },

    /// The backing key-value store failed.
    #[error("persistence failed: {reason}")]
    Persistence {
        /// Error message.
        reason: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    Config {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
