//! Domain Ports (Port/Adapter Pattern)
//!
//! Trait abstractions for everything the engine treats as a given host
//! primitive: named response stores, the network transport, and the host
//! runtime's lifecycle signals. Infrastructure adapters implement these
//! traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Worker Engine                          │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  StoreBackend │ Transport │ HostRuntime │ Events     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                   Adapters (Impls)                   │    │
//! │  │  DiskStore │ MemoryStore │ HttpTransport │ Logging   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::fetch::{FetchOptions, FetchRequest, FetchResponse};

use super::events::WorkerEvent;

// =============================================================================
// Store Port
// =============================================================================

/// Port for named response stores.
///
/// One backend hosts many namespaces; a namespace comes into existence
/// on first write. Key listing order is the contract the trimmer depends
/// on: insertion order, oldest first, and a replacing write keeps the
/// key's original position.
///
/// Operations on a single key are atomic; conflicting writes to the same
/// key serialize with last-write-wins. No ordering is guaranteed across
/// keys.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Look up a response. `Ok(None)` is a normal miss, not an error.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>>;

    /// Store a response, creating the namespace if needed. Replaces any
    /// existing value for the key.
    async fn put(&self, namespace: &str, key: &str, response: FetchResponse) -> Result<()>;

    /// Delete one entry. Returns `false` when the key was already absent.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// List keys in insertion order, oldest first. Empty for an unknown
    /// namespace.
    async fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// List every namespace identifier the backend currently holds.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Delete a namespace and all its entries. Returns `false` when the
    /// namespace was absent.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;
}

// =============================================================================
// Transport Port
// =============================================================================

/// Port for outbound fetches.
///
/// `Err(Error::Network { .. })` means the transport itself failed:
/// unreachable host, timeout, protocol error. A response with a non-2xx
/// status is still a successful fetch; strategies do not branch on
/// status.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a request with the given options.
    async fn fetch(&self, request: &FetchRequest, options: FetchOptions) -> Result<FetchResponse>;
}

// =============================================================================
// Host Runtime Port
// =============================================================================

/// Port for the host runtime's lifecycle signals.
///
/// The engine emits these at fixed lifecycle points; hosts that have no
/// notion of a signal implement it as a no-op.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Ask the host to let this worker supersede a predecessor instance
    /// without waiting.
    async fn skip_waiting(&self);

    /// Ask the host to route requests from already-open clients through
    /// this worker immediately.
    async fn claim_clients(&self);

    /// Ask the host to start preloading navigation requests in parallel
    /// with worker startup. Hosts may not support this; activation
    /// swallows the failure.
    async fn enable_navigation_preload(&self) -> Result<()>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing worker events.
///
/// This trait abstracts event publishing, allowing different backends
/// (logging, in-memory collection) to be used.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a worker event.
    async fn publish(&self, event: WorkerEvent) -> Result<()>;

    /// Publish multiple events.
    async fn publish_all(&self, events: Vec<WorkerEvent>) -> Result<()>;
}
