//! Error types for the offline cache worker

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache worker
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network fetch failed at the transport level (unreachable host,
    /// timeout, protocol error). Strategies catch this at their boundary
    /// and fall back to cached content or an opaque error response; it
    /// never crosses the request-handling entry point.
    #[error("network fetch failed for {url}: {reason}")]
    Network { url: String, reason: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Shell installation failed. Any single asset failing fetch or write
    /// aborts the whole installation.
    #[error("install failed while caching {asset}: {reason}")]
    Install { asset: String, reason: String },

    /// A shell asset could not be served: the network failed and there is
    /// no cached copy. The one request-path error that propagates.
    #[error("shell asset unavailable (network failed, nothing cached): {key}")]
    AssetUnavailable { key: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// I/O error from a store backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry metadata could not be encoded or decoded
    #[error("entry metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Store backend failure not covered by a more specific variant
    #[error("store error: {0}")]
    Store(String),

    /// Stored body could not be decompressed
    #[error("decompression failed for {key}: {reason}")]
    Decompression { key: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid worker configuration, rejected before the worker starts
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for transport-level failures, the errors every strategy is
    /// required to absorb.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}
