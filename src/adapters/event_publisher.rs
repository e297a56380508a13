//! Event Publisher Adapters
//!
//! Two implementations of the `EventPublisher` port: a tracing-backed
//! publisher for the running daemon and an in-memory collector that
//! lifecycle and engine tests use to observe what was emitted.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::events::WorkerEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Publishes worker events as structured tracing records.
///
/// Each event variant maps to its own log line with the fields that
/// matter for that event: lifecycle transitions land at `info`, a failed
/// install at `warn`, and per-request maintenance (trims, shell
/// refreshes) at `debug` so steady-state tile traffic stays quiet.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: WorkerEvent) -> Result<()> {
        match &event {
            WorkerEvent::InstallStarted {
                version,
                asset_count,
                ..
            } => {
                info!(%version, asset_count, "shell install started");
            }
            WorkerEvent::InstallCompleted {
                version,
                assets_cached,
                duration_ms,
                ..
            } => {
                info!(%version, assets_cached, duration_ms, "shell install completed");
            }
            WorkerEvent::InstallFailed {
                version,
                asset,
                reason,
                ..
            } => {
                warn!(%version, %asset, %reason, "shell install failed");
            }
            WorkerEvent::ActivationCompleted {
                version,
                purged_namespaces,
                preload_enabled,
                ..
            } => {
                info!(
                    %version,
                    purged = purged_namespaces.len(),
                    preload_enabled,
                    "activation completed"
                );
            }
            WorkerEvent::NamespacePurged { namespace, .. } => {
                info!(%namespace, "stale cache namespace purged");
            }
            WorkerEvent::EntriesTrimmed {
                namespace,
                evicted,
                remaining,
                ..
            } => {
                debug!(%namespace, evicted, remaining, "trimmed namespace to bound");
            }
            WorkerEvent::ShellAssetRefreshed { key, status, .. } => {
                debug!(%key, status, "shell asset refreshed from network");
            }
        }
        Ok(())
    }

    async fn publish_all(&self, events: Vec<WorkerEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Records published events for inspection.
///
/// Test doubles hand this to the lifecycle and the engine, then assert
/// on the recorded sequence after driving a scenario.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    recorded: Mutex<Vec<WorkerEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in publish order.
    pub fn events(&self) -> Vec<WorkerEvent> {
        self.recorded.lock().clone()
    }

    /// The recorded events matching one type name.
    pub fn events_of_type(&self, event_type: &str) -> Vec<WorkerEvent> {
        self.recorded
            .lock()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }

    /// Forget everything recorded, for scenarios staged in phases.
    pub fn clear(&self) {
        self.recorded.lock().clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: WorkerEvent) -> Result<()> {
        self.recorded.lock().push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<WorkerEvent>) -> Result<()> {
        self.recorded.lock().extend(events);
        Ok(())
    }
}
