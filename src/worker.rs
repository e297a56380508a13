//! Worker Engine
//!
//! The request-handling entry point: classifies each intercepted request
//! and drives it through the fetch strategy of its class. Every strategy
//! resolves to a [`FetchResponse`]; the one error that crosses the entry
//! point is the shell-asset double miss, where the network failed and
//! nothing was ever cached for the key.
//!
//! Each call runs as an independent future. The engine keeps no
//! per-request state, so concurrent requests interleave freely at store
//! and network suspension points; ordering within one call follows the
//! strategy's program order.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::classify::{RequestClass, RequestClassifier};
use crate::config::WorkerConfig;
use crate::domain::events::WorkerEvent;
use crate::domain::ports::{EventPublisher, StoreBackend, Transport};
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, FetchRequest, FetchResponse};
use crate::metrics::WorkerMetrics;
use crate::registry::{CacheRole, NamespaceRegistry};
use crate::trim::trim_to_bound;

/// The caching and request-routing policy engine
pub struct WorkerEngine {
    config: WorkerConfig,
    registry: NamespaceRegistry,
    classifier: RequestClassifier,
    store: Arc<dyn StoreBackend>,
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerEngine {
    /// Build an engine over the injected ports. Fails when the
    /// configuration is internally inconsistent.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn StoreBackend>,
        transport: Arc<dyn Transport>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = NamespaceRegistry::new(config.version.clone());
        let classifier =
            RequestClassifier::new(config.shell_assets.clone(), config.shell_prefixes.clone());
        Ok(Self {
            config,
            registry,
            classifier,
            store,
            transport,
            events,
            metrics: Arc::new(WorkerMetrics::new()),
        })
    }

    /// The engine's configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// The namespace registry for the configured version
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Lifetime counters for the request path
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Classify a request without handling it
    pub fn classify(&self, request: &FetchRequest) -> RequestClass {
        self.classifier.classify(request)
    }

    /// Handle an intercepted request with no preload response available.
    pub async fn handle(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.handle_with_preload(request, None).await
    }

    /// Handle an intercepted request. `preload` is the navigation preload
    /// response if the host produced one; only the navigation strategy
    /// consumes it.
    #[instrument(skip(self, preload), fields(url = %request.url()))]
    pub async fn handle_with_preload(
        &self,
        request: &FetchRequest,
        preload: Option<FetchResponse>,
    ) -> Result<FetchResponse> {
        let class = self.classifier.classify(request);
        self.metrics.record_request(class);
        debug!(class = %class, "dispatching request");

        match class {
            RequestClass::Navigation => self.serve_navigation(request, preload).await,
            RequestClass::ShellAsset => self.serve_shell_asset(request).await,
            RequestClass::StandardTile => {
                self.serve_tile(request, CacheRole::Tile, self.config.tile_bound)
                    .await
            }
            RequestClass::SatelliteTile => {
                self.serve_tile(request, CacheRole::Satellite, self.config.satellite_bound)
                    .await
            }
            RequestClass::Fallback => self.serve_fallback(request).await,
        }
    }

    /// Navigation: preload, then network, then the cached root document,
    /// then the error sentinel. Never an error.
    async fn serve_navigation(
        &self,
        request: &FetchRequest,
        preload: Option<FetchResponse>,
    ) -> Result<FetchResponse> {
        if let Some(response) = preload {
            self.metrics.record_preload_served();
            return Ok(response);
        }

        self.metrics.record_network_fetch();
        match self.transport.fetch(request, FetchOptions::default()).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_network() => {
                self.metrics.record_network_failure();
                let shell = self.registry.namespace(CacheRole::Shell);
                match self.store.get(&shell, &self.config.root_document).await? {
                    Some(cached) => {
                        debug!("serving cached root document to offline navigation");
                        Ok(cached)
                    }
                    None => {
                        self.metrics.record_error_response();
                        Ok(FetchResponse::error())
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Shell assets: network-first with cache write-back. The double miss
    /// (network failed, nothing cached) propagates: shell assets are
    /// installed up front, so reaching it signals a broken install.
    async fn serve_shell_asset(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let shell = self.registry.namespace(CacheRole::Shell);

        self.metrics.record_network_fetch();
        match self.transport.fetch(request, FetchOptions::default()).await {
            Ok(response) => {
                self.store.put(&shell, request.url(), response.clone()).await?;
                self.metrics.record_write();
                self.events
                    .publish(WorkerEvent::shell_asset_refreshed(
                        request.url(),
                        response.status(),
                    ))
                    .await?;
                Ok(response)
            }
            Err(err) if err.is_network() => {
                self.metrics.record_network_failure();
                match self.store.get(&shell, request.url()).await? {
                    Some(cached) => Ok(cached),
                    None => {
                        warn!(url = %request.url(), "shell asset double miss");
                        self.metrics.record_shell_unavailable();
                        Err(Error::AssetUnavailable {
                            key: request.url().to_string(),
                        })
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Tiles: cache-first. A hit never touches the network, which is what
    /// keeps previously-viewed map areas browsable offline. A miss
    /// fetches cross-origin without credentials, writes back, and trims
    /// the namespace to its bound before the response is returned.
    async fn serve_tile(
        &self,
        request: &FetchRequest,
        role: CacheRole,
        bound: usize,
    ) -> Result<FetchResponse> {
        let namespace = self.registry.namespace(role);

        if let Some(cached) = self.store.get(&namespace, request.url()).await? {
            self.metrics.record_cache_hit();
            return Ok(cached);
        }
        self.metrics.record_cache_miss();

        self.metrics.record_network_fetch();
        match self
            .transport
            .fetch(request, FetchOptions::cross_origin_no_credentials())
            .await
        {
            Ok(response) => {
                self.store
                    .put(&namespace, request.url(), response.clone())
                    .await?;
                self.metrics.record_write();

                let evicted = trim_to_bound(self.store.as_ref(), &namespace, bound).await?;
                if evicted > 0 {
                    self.metrics.record_evictions(evicted as u64);
                    self.events
                        .publish(WorkerEvent::entries_trimmed(&namespace, evicted, bound))
                        .await?;
                }
                Ok(response)
            }
            Err(err) if err.is_network() => {
                self.metrics.record_network_failure();
                self.metrics.record_error_response();
                Ok(FetchResponse::error())
            }
            Err(err) => Err(err),
        }
    }

    /// Everything else: network, then an exact-key shell lookup, then the
    /// error sentinel.
    async fn serve_fallback(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.metrics.record_network_fetch();
        match self.transport.fetch(request, FetchOptions::default()).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_network() => {
                self.metrics.record_network_failure();
                let shell = self.registry.namespace(CacheRole::Shell);
                match self.store.get(&shell, request.url()).await? {
                    Some(cached) => Ok(cached),
                    None => {
                        self.metrics.record_error_response();
                        Ok(FetchResponse::error())
                    }
                }
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for WorkerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEngine")
            .field("version", &self.config.version)
            .field("tile_bound", &self.config.tile_bound)
            .field("satellite_bound", &self.config.satellite_bound)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
