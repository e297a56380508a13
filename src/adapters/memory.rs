//! In-Memory Adapters
//!
//! [`MemoryStore`] and [`StaticTransport`] back the engine without disk
//! or network. Used by the test suites and by the daemon's `--in-memory`
//! mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::ports::{StoreBackend, Transport};
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, FetchRequest, FetchResponse};

/// One namespace: entries keyed by URL plus an insertion-order index.
/// A replacing write keeps the entry's original sequence number, which
/// keeps its position in the order index.
#[derive(Debug, Default)]
struct Namespace {
    /// key -> (insertion sequence, stored response)
    entries: HashMap<String, (u64, FetchResponse)>,
    /// insertion sequence -> key, iterated oldest first
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

/// In-memory store backend
///
/// Namespace operations take the namespace's DashMap shard lock, so
/// per-key reads and writes are atomic and conflicting writes to one
/// key serialize with last-write-wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: DashMap<String, Namespace>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a namespace (0 when absent)
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.entries.len())
            .unwrap_or(0)
    }

    /// Whether a namespace holds no entries
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key).map(|(_, response)| response.clone())))
    }

    async fn put(&self, namespace: &str, key: &str, response: FetchResponse) -> Result<()> {
        let mut guard = self.namespaces.entry(namespace.to_string()).or_default();
        let ns = guard.value_mut();

        match ns.entries.entry(key.to_string()) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                // Replace in place, keeping the original insertion position
                slot.get_mut().1 = response;
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                let seq = ns.next_seq;
                ns.next_seq += 1;
                slot.insert((seq, response));
                ns.order.insert(seq, key.to_string());
            }
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        if let Some(mut guard) = self.namespaces.get_mut(namespace) {
            let ns = guard.value_mut();
            if let Some((seq, _)) = ns.entries.remove(key) {
                ns.order.remove(&seq);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .namespaces
            .get(namespace)
            .map(|ns| ns.order.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.remove(namespace).is_some())
    }
}

/// Transport serving a fixed route table
///
/// URLs without a route fail the same way an unreachable network does,
/// and the whole transport can be flipped offline. Tests use the fetch
/// counter to prove cache-first strategies never touch the network on a
/// hit.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: DashMap<String, FetchResponse>,
    offline: AtomicBool,
    fetches: AtomicU64,
    last_options: Mutex<Option<FetchOptions>>,
}

impl StaticTransport {
    /// Create a transport with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`
    pub fn route(&self, url: impl Into<String>, response: FetchResponse) {
        self.routes.insert(url.into(), response);
    }

    /// Remove a route, making the URL unreachable again
    pub fn unroute(&self, url: &str) {
        self.routes.remove(url);
    }

    /// Make every fetch fail while `offline` is true
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Total fetch attempts, including failed ones
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Options the most recent fetch carried
    pub fn last_options(&self) -> Option<FetchOptions> {
        *self.last_options.lock()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn fetch(&self, request: &FetchRequest, options: FetchOptions) -> Result<FetchResponse> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        *self.last_options.lock() = Some(options);

        if self.offline.load(Ordering::Relaxed) {
            return Err(Error::Network {
                url: request.url().to_string(),
                reason: "offline".to_string(),
            });
        }

        match self.routes.get(request.url()) {
            Some(response) => Ok(response.clone()),
            None => Err(Error::Network {
                url: request.url().to_string(),
                reason: "no route to host".to_string(),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(body: &str) -> FetchResponse {
        FetchResponse::ok(body.to_string()).with_header("content-type", "image/png")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip_preserves_everything() {
        let store = MemoryStore::new();
        let original = FetchResponse::new(
            203,
            vec![
                ("content-type".to_string(), "image/png".to_string()),
                ("etag".to_string(), "\"abc\"".to_string()),
            ],
            bytes::Bytes::from_static(b"\x89PNG tile"),
        );

        store.put("tiles-v2", "url", original.clone()).await.unwrap();
        let loaded = store.get("tiles-v2", "url").await.unwrap().unwrap();

        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_miss_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(store.get("tiles-v2", "missing").await.unwrap().is_none());
        assert!(store.get("no-namespace", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_are_insertion_ordered() {
        let store = MemoryStore::new();
        for key in ["c", "a", "b"] {
            store.put("ns", key, make_response(key)).await.unwrap();
        }

        assert_eq!(store.keys("ns").await.unwrap(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_replacing_write_keeps_position() {
        let store = MemoryStore::new();
        for key in ["first", "second", "third"] {
            store.put("ns", key, make_response(key)).await.unwrap();
        }

        store.put("ns", "first", make_response("updated")).await.unwrap();

        // Still oldest, and the value is the replacement
        assert_eq!(store.keys("ns").await.unwrap(), vec!["first", "second", "third"]);
        let loaded = store.get("ns", "first").await.unwrap().unwrap();
        assert_eq!(loaded.body().as_ref(), b"updated");
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryStore::new();
        store.put("ns", "key", make_response("x")).await.unwrap();

        assert!(store.delete("ns", "key").await.unwrap());
        assert!(!store.delete("ns", "key").await.unwrap());
        assert!(!store.delete("other", "key").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_listing_and_deletion() {
        let store = MemoryStore::new();
        store.put("app-v1", "a", make_response("a")).await.unwrap();
        store.put("tiles-v2", "b", make_response("b")).await.unwrap();

        assert_eq!(
            store.list_namespaces().await.unwrap(),
            vec!["app-v1", "tiles-v2"]
        );

        assert!(store.delete_namespace("app-v1").await.unwrap());
        assert!(!store.delete_namespace("app-v1").await.unwrap());
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["tiles-v2"]);
        assert!(store.get("app-v1", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_transport_routes() {
        let transport = StaticTransport::new();
        transport.route("https://x.example/a", make_response("a"));

        let ok = transport
            .fetch(&FetchRequest::new("https://x.example/a"), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(ok.body().as_ref(), b"a");

        let err = transport
            .fetch(&FetchRequest::new("https://x.example/b"), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_static_transport_offline_flag() {
        let transport = StaticTransport::new();
        transport.route("https://x.example/a", make_response("a"));
        transport.set_offline(true);

        let err = transport
            .fetch(&FetchRequest::new("https://x.example/a"), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_network());

        transport.set_offline(false);
        assert!(transport
            .fetch(&FetchRequest::new("https://x.example/a"), FetchOptions::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_static_transport_records_options() {
        let transport = StaticTransport::new();
        transport.route("https://x.example/a", make_response("a"));

        transport
            .fetch(
                &FetchRequest::new("https://x.example/a"),
                FetchOptions::cross_origin_no_credentials(),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.last_options(),
            Some(FetchOptions::cross_origin_no_credentials())
        );
    }
}
