//! Domain Layer
//!
//! Core abstractions the engine is written against.
//!
//! # Architecture
//!
//! The domain layer is organized into:
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the host primitives
//!   (stores, transport, lifecycle signals, event publishing)
//! - **Events** (`events.rs`) - Worker events for audit and decoupling
//!
//! # Usage
//!
//! ```ignore
//! use tilevault::domain::ports::{StoreBackend, Transport};
//! use tilevault::domain::events::WorkerEvent;
//!
//! // Ports are injected, so strategies stay host-agnostic
//! async fn serve_cached<S>(store: &S, namespace: &str, url: &str) -> Result<Option<FetchResponse>>
//! where
//!     S: StoreBackend,
//! {
//!     store.get(namespace, url).await
//! }
//! ```

pub mod events;
pub mod ports;

// Re-export commonly used types
pub use events::WorkerEvent;
pub use ports::{EventPublisher, HostRuntime, StoreBackend, Transport};
