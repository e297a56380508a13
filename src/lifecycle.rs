//! Lifecycle Manager
//!
//! Two fixed-point operations, outside the per-request flow:
//!
//! - **install**: bulk-populate the shell namespace with every configured
//!   asset, all-or-nothing, then ask the host to supersede a predecessor.
//! - **activate**: purge every namespace outside the current generation,
//!   best-effort enable navigation preload, then claim open clients.
//!
//! Install failure is the one lifecycle error that propagates: a broken
//! install must not become the active worker.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::config::WorkerConfig;
use crate::domain::events::WorkerEvent;
use crate::domain::ports::{EventPublisher, HostRuntime, StoreBackend, Transport};
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, FetchRequest};
use crate::registry::{CacheRole, NamespaceRegistry};

/// Outcome of a completed activation
#[derive(Debug, Clone)]
pub struct ActivationReport {
    /// Stale namespaces deleted
    pub purged: Vec<String>,
    /// Whether the host accepted the navigation-preload request
    pub preload_enabled: bool,
}

/// Install/activate orchestrator
pub struct Lifecycle {
    config: WorkerConfig,
    registry: NamespaceRegistry,
    store: Arc<dyn StoreBackend>,
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostRuntime>,
    events: Arc<dyn EventPublisher>,
}

impl Lifecycle {
    /// Build a lifecycle manager over the injected ports.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn StoreBackend>,
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostRuntime>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = NamespaceRegistry::new(config.version.clone());
        Ok(Self {
            config,
            registry,
            store,
            transport,
            host,
            events,
        })
    }

    /// Install the shell: fetch and cache every configured asset. Any
    /// single failure aborts the whole installation with a fatal error.
    /// On success the host is asked to supersede a predecessor instance
    /// without waiting.
    #[instrument(skip(self), fields(version = %self.config.version))]
    pub async fn install(&self) -> Result<()> {
        let start = Instant::now();
        let shell = self.registry.namespace(CacheRole::Shell);

        self.events
            .publish(WorkerEvent::install_started(
                &self.config.version,
                self.config.shell_assets.len(),
            ))
            .await?;

        for asset in &self.config.shell_assets {
            if let Err(err) = self.cache_asset(&shell, asset).await {
                self.events
                    .publish(WorkerEvent::install_failed(
                        &self.config.version,
                        asset,
                        err.to_string(),
                    ))
                    .await?;
                return Err(err);
            }
        }

        self.events
            .publish(WorkerEvent::install_completed(
                &self.config.version,
                self.config.shell_assets.len(),
                start.elapsed(),
            ))
            .await?;

        info!(
            assets = self.config.shell_assets.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "shell installed"
        );
        self.host.skip_waiting().await;
        Ok(())
    }

    async fn cache_asset(&self, shell: &str, asset: &str) -> Result<()> {
        let request = FetchRequest::new(asset);
        let response = self
            .transport
            .fetch(&request, FetchOptions::default())
            .await
            .map_err(|err| Error::Install {
                asset: asset.to_string(),
                reason: err.to_string(),
            })?;
        self.store
            .put(shell, asset, response)
            .await
            .map_err(|err| Error::Install {
                asset: asset.to_string(),
                reason: err.to_string(),
            })
    }

    /// Activate this generation: delete every namespace not in the
    /// current set, best-effort enable navigation preload, and claim
    /// open clients.
    #[instrument(skip(self), fields(version = %self.config.version))]
    pub async fn activate(&self) -> Result<ActivationReport> {
        let stale: Vec<String> = self
            .store
            .list_namespaces()
            .await?
            .into_iter()
            .filter(|ns| !self.registry.is_current(ns))
            .collect();

        // Deletions are independent; run them concurrently and await all
        let deletions = join_all(
            stale
                .iter()
                .map(|ns| self.store.delete_namespace(ns.as_str())),
        )
        .await;

        let mut purged = Vec::new();
        for (namespace, outcome) in stale.into_iter().zip(deletions) {
            // A namespace another instance already removed is still purged
            outcome?;
            self.events
                .publish(WorkerEvent::namespace_purged(&namespace))
                .await?;
            purged.push(namespace);
        }

        let preload_enabled = match self.host.enable_navigation_preload().await {
            Ok(()) => true,
            Err(err) => {
                // Preload is an optimization; a host without it is fine
                warn!(error = %err, "navigation preload unavailable");
                false
            }
        };

        self.host.claim_clients().await;

        self.events
            .publish(WorkerEvent::activation_completed(
                &self.config.version,
                purged.clone(),
                preload_enabled,
            ))
            .await?;

        info!(
            purged = purged.len(),
            preload_enabled, "activation complete"
        );
        Ok(ActivationReport {
            purged,
            preload_enabled,
        })
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("version", &self.config.version)
            .field("assets", &self.config.shell_assets.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
