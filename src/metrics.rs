//! Worker Metrics Collection
//!
//! Counters for monitoring cache effectiveness and network health,
//! kept on lock-free atomics so the request path never blocks on
//! observation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::classify::RequestClass;

/// Worker metrics collector
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    // Request routing
    navigation_requests: AtomicU64,
    shell_requests: AtomicU64,
    tile_requests: AtomicU64,
    satellite_requests: AtomicU64,
    fallback_requests: AtomicU64,

    // Cache effectiveness (tile namespaces)
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Network
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    preload_served: AtomicU64,

    // Store maintenance
    entries_written: AtomicU64,
    entries_evicted: AtomicU64,
    namespaces_purged: AtomicU64,

    // Degraded outcomes
    error_responses: AtomicU64,
    shell_unavailable: AtomicU64,
}

impl WorkerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a classified request
    pub fn record_request(&self, class: RequestClass) {
        let counter = match class {
            RequestClass::Navigation => &self.navigation_requests,
            RequestClass::ShellAsset => &self.shell_requests,
            RequestClass::StandardTile => &self.tile_requests,
            RequestClass::SatelliteTile => &self.satellite_requests,
            RequestClass::Fallback => &self.fallback_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preload_served(&self) {
        self.preload_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.entries_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.entries_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_namespace_purged(&self) {
        self.namespaces_purged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_response(&self) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shell_unavailable(&self) {
        self.shell_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Tile cache hit ratio over the process lifetime
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.cache_hits() as f64;
        let total = hits + self.cache_misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn network_failures(&self) -> u64 {
        self.network_failures.load(Ordering::Relaxed)
    }

    pub fn entries_evicted(&self) -> u64 {
        self.entries_evicted.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            navigation_requests: self.navigation_requests.load(Ordering::Relaxed),
            shell_requests: self.shell_requests.load(Ordering::Relaxed),
            tile_requests: self.tile_requests.load(Ordering::Relaxed),
            satellite_requests: self.satellite_requests.load(Ordering::Relaxed),
            fallback_requests: self.fallback_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            hit_ratio: self.hit_ratio(),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            network_failures: self.network_failures(),
            preload_served: self.preload_served.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted(),
            namespaces_purged: self.namespaces_purged.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            shell_unavailable: self.shell_unavailable.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.navigation_requests.store(0, Ordering::Relaxed);
        self.shell_requests.store(0, Ordering::Relaxed);
        self.tile_requests.store(0, Ordering::Relaxed);
        self.satellite_requests.store(0, Ordering::Relaxed);
        self.fallback_requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.network_fetches.store(0, Ordering::Relaxed);
        self.network_failures.store(0, Ordering::Relaxed);
        self.preload_served.store(0, Ordering::Relaxed);
        self.entries_written.store(0, Ordering::Relaxed);
        self.entries_evicted.store(0, Ordering::Relaxed);
        self.namespaces_purged.store(0, Ordering::Relaxed);
        self.error_responses.store(0, Ordering::Relaxed);
        self.shell_unavailable.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of all worker metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub navigation_requests: u64,
    pub shell_requests: u64,
    pub tile_requests: u64,
    pub satellite_requests: u64,
    pub fallback_requests: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_ratio: f64,

    pub network_fetches: u64,
    pub network_failures: u64,
    pub preload_served: u64,

    pub entries_written: u64,
    pub entries_evicted: u64,
    pub namespaces_purged: u64,

    pub error_responses: u64,
    pub shell_unavailable: u64,
}

// =============================================================================
// Tests
// =============================================================================
