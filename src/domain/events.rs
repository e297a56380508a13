//! Worker Events
//!
//! Immutable records of significant occurrences in the worker: lifecycle
//! transitions, generation purges, and cache maintenance. Published
//! through the [`EventPublisher`](super::ports::EventPublisher) port for
//! audit logging and test observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker event representing a significant occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerEvent {
    // =========================================================================
    // Install Events
    // =========================================================================
    /// Shell installation started.
    InstallStarted {
        version: String,
        asset_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Shell installation completed; every asset is cached.
    InstallCompleted {
        version: String,
        assets_cached: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Shell installation failed on one asset and was aborted.
    InstallFailed {
        version: String,
        asset: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Activation Events
    // =========================================================================
    /// Activation completed: stale generations purged, clients claimed.
    ActivationCompleted {
        version: String,
        purged_namespaces: Vec<String>,
        preload_enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// A namespace from a previous generation was deleted.
    NamespacePurged {
        namespace: String,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Cache Maintenance Events
    // =========================================================================
    /// A bounded namespace was trimmed back to its entry bound.
    EntriesTrimmed {
        namespace: String,
        evicted: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    /// A shell asset was re-fetched from the network and its cached copy
    /// overwritten.
    ShellAssetRefreshed {
        key: String,
        status: u16,
        timestamp: DateTime<Utc>,
    },
}

impl WorkerEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkerEvent::InstallStarted { timestamp, .. } => *timestamp,
            WorkerEvent::InstallCompleted { timestamp, .. } => *timestamp,
            WorkerEvent::InstallFailed { timestamp, .. } => *timestamp,
            WorkerEvent::ActivationCompleted { timestamp, .. } => *timestamp,
            WorkerEvent::NamespacePurged { timestamp, .. } => *timestamp,
            WorkerEvent::EntriesTrimmed { timestamp, .. } => *timestamp,
            WorkerEvent::ShellAssetRefreshed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkerEvent::InstallStarted { .. } => "InstallStarted",
            WorkerEvent::InstallCompleted { .. } => "InstallCompleted",
            WorkerEvent::InstallFailed { .. } => "InstallFailed",
            WorkerEvent::ActivationCompleted { .. } => "ActivationCompleted",
            WorkerEvent::NamespacePurged { .. } => "NamespacePurged",
            WorkerEvent::EntriesTrimmed { .. } => "EntriesTrimmed",
            WorkerEvent::ShellAssetRefreshed { .. } => "ShellAssetRefreshed",
        }
    }

    /// Get the namespace if the event concerns one.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            WorkerEvent::NamespacePurged { namespace, .. } => Some(namespace),
            WorkerEvent::EntriesTrimmed { namespace, .. } => Some(namespace),
            _ => None,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl WorkerEvent {
    /// Create an InstallStarted event.
    pub fn install_started(version: impl Into<String>, asset_count: usize) -> Self {
        WorkerEvent::InstallStarted {
            version: version.into(),
            asset_count,
            timestamp: Utc::now(),
        }
    }

    /// Create an InstallCompleted event.
    pub fn install_completed(
        version: impl Into<String>,
        assets_cached: usize,
        duration: Duration,
    ) -> Self {
        WorkerEvent::InstallCompleted {
            version: version.into(),
            assets_cached,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Create an InstallFailed event.
    pub fn install_failed(
        version: impl Into<String>,
        asset: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        WorkerEvent::InstallFailed {
            version: version.into(),
            asset: asset.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an ActivationCompleted event.
    pub fn activation_completed(
        version: impl Into<String>,
        purged_namespaces: Vec<String>,
        preload_enabled: bool,
    ) -> Self {
        WorkerEvent::ActivationCompleted {
            version: version.into(),
            purged_namespaces,
            preload_enabled,
            timestamp: Utc::now(),
        }
    }

    /// Create a NamespacePurged event.
    pub fn namespace_purged(namespace: impl Into<String>) -> Self {
        WorkerEvent::NamespacePurged {
            namespace: namespace.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an EntriesTrimmed event.
    pub fn entries_trimmed(namespace: impl Into<String>, evicted: usize, remaining: usize) -> Self {
        WorkerEvent::EntriesTrimmed {
            namespace: namespace.into(),
            evicted,
            remaining,
            timestamp: Utc::now(),
        }
    }

    /// Create a ShellAssetRefreshed event.
    pub fn shell_asset_refreshed(key: impl Into<String>, status: u16) -> Self {
        WorkerEvent::ShellAssetRefreshed {
            key: key.into(),
            status,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
