//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  StoreBackend │ Transport │ HostRuntime │ EventPublisher   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                         │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌────────────────┐ │
//! │  │   Disk   │  │  Memory  │  │   HTTP    │  │    Logging     │ │
//! │  │  Store   │  │  Store   │  │ Transport │  │ Host + Events  │ │
//! │  └──────────┘  └──────────┘  └───────────┘  └────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod disk;
pub mod event_publisher;
pub mod host;
pub mod http;
pub mod memory;

pub use disk::{DiskStore, DiskStoreConfig};
pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use host::{LoggingHostRuntime, RecordingHostRuntime};
pub use http::{HttpTransport, HttpTransportConfig};
pub use memory::{MemoryStore, StaticTransport};
