//! Host Runtime Adapters
//!
//! Implements the `HostRuntime` port. The daemon embeds the engine with
//! no predecessor instances or client registry, so its host adapter only
//! logs the signals; the recording adapter lets tests assert they were
//! emitted at the right lifecycle points.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::HostRuntime;
use crate::error::{Error, Result};

/// Host adapter that acknowledges every signal and logs it.
#[derive(Debug, Clone, Default)]
pub struct LoggingHostRuntime;

impl LoggingHostRuntime {
    /// Create a new logging host runtime.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostRuntime for LoggingHostRuntime {
    async fn skip_waiting(&self) {
        info!("host signal: skip waiting");
    }

    async fn claim_clients(&self) {
        info!("host signal: claim clients");
    }

    async fn enable_navigation_preload(&self) -> Result<()> {
        info!("host signal: enable navigation preload");
        Ok(())
    }
}

/// Host adapter that records which signals were emitted.
///
/// `fail_preload` simulates a host without navigation preload, the case
/// activation is required to swallow.
#[derive(Debug, Default)]
pub struct RecordingHostRuntime {
    skip_waiting: AtomicBool,
    claim_clients: AtomicBool,
    preload_requested: AtomicBool,
    preload_fails: AtomicBool,
}

impl RecordingHostRuntime {
    /// Create a new recording host runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `enable_navigation_preload` fail.
    pub fn fail_preload(&self, fail: bool) {
        self.preload_fails.store(fail, Ordering::Relaxed);
    }

    /// Whether `skip_waiting` was signaled.
    pub fn skip_waiting_called(&self) -> bool {
        self.skip_waiting.load(Ordering::Relaxed)
    }

    /// Whether `claim_clients` was signaled.
    pub fn claim_clients_called(&self) -> bool {
        self.claim_clients.load(Ordering::Relaxed)
    }

    /// Whether preload enabling was attempted, successfully or not.
    pub fn preload_requested(&self) -> bool {
        self.preload_requested.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HostRuntime for RecordingHostRuntime {
    async fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Relaxed);
    }

    async fn claim_clients(&self) {
        self.claim_clients.store(true, Ordering::Relaxed);
    }

    async fn enable_navigation_preload(&self) -> Result<()> {
        self.preload_requested.store(true, Ordering::Relaxed);
        if self.preload_fails.load(Ordering::Relaxed) {
            return Err(Error::Store(
                "navigation preload is not supported by this host".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_runtime_accepts_every_signal() {
        let host = LoggingHostRuntime::new();
        host.skip_waiting().await;
        host.claim_clients().await;
        assert!(host.enable_navigation_preload().await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_runtime_tracks_signals() {
        let host = RecordingHostRuntime::new();
        assert!(!host.skip_waiting_called());

        host.skip_waiting().await;
        host.claim_clients().await;
        assert!(host.skip_waiting_called());
        assert!(host.claim_clients_called());
    }

    #[tokio::test]
    async fn test_preload_failure_toggle() {
        let host = RecordingHostRuntime::new();
        assert!(host.enable_navigation_preload().await.is_ok());

        host.fail_preload(true);
        assert!(host.enable_navigation_preload().await.is_err());
        assert!(host.preload_requested());
    }
}
