//! TileVault - Offline Cache Worker for Tile Map Applications
//!
//! A caching and request-routing policy engine that keeps a tile-based
//! map application usable without network connectivity: the application
//! shell and previously-viewed map tiles are served from named, versioned,
//! bounded caches.
//!
//! # Architecture
//!
//! Every intercepted request flows through the same pipeline:
//!
//! ```text
//! Request → Classifier → Per-Class Strategy → Store / Transport
//! ```
//!
//! - **Classifier**: precedence-ordered rule table mapping a request to
//!   its class (navigation, shell asset, standard tile, satellite tile,
//!   fallback)
//! - **Strategies**: cache-first for tiles (bounded, trimmed after every
//!   write), network-first for shell assets, preload/network/cache for
//!   navigations
//! - **Registry**: (role, version) → namespace identifier; the three
//!   identifiers of the configured version form the current generation
//! - **Lifecycle**: install bulk-populates the shell all-or-nothing;
//!   activate purges every namespace outside the current generation
//!
//! Host facilities are reached through ports ([`domain::ports`]), so the
//! engine runs identically over the disk store, the in-memory store, or
//! anything else implementing them.
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`classify`] - Request classification rule table
//! - [`config`] - Injected worker configuration
//! - [`domain`] - Domain layer with ports and events (DDD)
//! - [`error`] - Error types
//! - [`fetch`] - Request/response value objects
//! - [`lifecycle`] - Install and activation orchestration
//! - [`metrics`] - Worker counters and snapshots
//! - [`registry`] - Cache namespace registry
//! - [`trim`] - Bounded store trimming
//! - [`worker`] - The request-handling engine

pub mod adapters;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod trim;
pub mod worker;

// Re-export commonly used types
pub use classify::{RequestClass, RequestClassifier};
pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use fetch::{FetchOptions, FetchRequest, FetchResponse};
pub use lifecycle::{ActivationReport, Lifecycle};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use registry::{CacheRole, NamespaceRegistry};
pub use worker::WorkerEngine;
