//! TileVault Integration Tests
//!
//! End-to-end scenarios across lifecycle and request handling:
//! - install / activate generation management
//! - per-class fetch strategies over the in-memory adapters
//! - bounded namespaces under sustained tile traffic
//! - the full engine over the disk store

use std::sync::Arc;

use assert_matches::assert_matches;
use proptest::prelude::*;

use tilevault::adapters::{
    DiskStore, DiskStoreConfig, InMemoryEventCollector, MemoryStore, RecordingHostRuntime,
    StaticTransport,
};
use tilevault::domain::ports::{EventPublisher, HostRuntime, StoreBackend, Transport};
use tilevault::trim::trim_to_bound;
use tilevault::{
    Error, FetchRequest, FetchResponse, Lifecycle, RequestClass, WorkerConfig, WorkerEngine,
};

const ORIGIN: &str = "https://maps.example";
const TILE: &str = "https://a.tile.openstreetmap.org/3/4/5.png";

struct Deployment {
    engine: WorkerEngine,
    lifecycle: Lifecycle,
    store: Arc<MemoryStore>,
    transport: Arc<StaticTransport>,
    host: Arc<RecordingHostRuntime>,
    events: Arc<InMemoryEventCollector>,
}

/// A deployment over the in-memory adapters, with every shell asset
/// reachable on the network.
fn deployment(version: &str) -> Deployment {
    let config = WorkerConfig::for_origin(ORIGIN, version);
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(StaticTransport::new());
    let host = Arc::new(RecordingHostRuntime::new());
    let events = Arc::new(InMemoryEventCollector::new());

    for asset in &config.shell_assets {
        transport.route(asset, FetchResponse::ok(format!("asset:{asset}")));
    }

    let engine = WorkerEngine::new(
        config.clone(),
        Arc::clone(&store) as Arc<dyn StoreBackend>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&events) as Arc<dyn EventPublisher>,
    )
    .unwrap();
    let lifecycle = Lifecycle::new(
        config,
        Arc::clone(&store) as Arc<dyn StoreBackend>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&host) as Arc<dyn HostRuntime>,
        Arc::clone(&events) as Arc<dyn EventPublisher>,
    )
    .unwrap();

    Deployment {
        engine,
        lifecycle,
        store,
        transport,
        host,
        events,
    }
}

// =============================================================================
// Lifecycle Scenarios
// =============================================================================

#[tokio::test]
async fn test_install_then_offline_navigation_serves_the_shell() {
    let d = deployment("v2");
    d.lifecycle.install().await.unwrap();

    // The network goes away entirely; a navigation still gets the app
    d.transport.set_offline(true);
    let response = d
        .engine
        .handle(&FetchRequest::navigation("https://maps.example/some/route"))
        .await
        .unwrap();
    assert_eq!(
        response.body().as_ref(),
        b"asset:https://maps.example/index.html"
    );
}

#[tokio::test]
async fn test_version_bump_migrates_generations() {
    // Generation v1 installs and caches some tiles
    let v1 = deployment("v1");
    v1.lifecycle.install().await.unwrap();
    v1.transport.route(TILE, FetchResponse::ok("tile"));
    v1.engine.handle(&FetchRequest::new(TILE)).await.unwrap();

    assert_eq!(v1.store.len("app-v1"), 4);
    assert_eq!(v1.store.len("tiles-v1"), 1);

    // Redeploy as v2 over the same store
    let config = WorkerConfig::for_origin(ORIGIN, "v2");
    let transport = Arc::new(StaticTransport::new());
    for asset in &config.shell_assets {
        transport.route(asset, FetchResponse::ok("v2 asset"));
    }
    let host = Arc::new(RecordingHostRuntime::new());
    let events = Arc::new(InMemoryEventCollector::new());
    let lifecycle = Lifecycle::new(
        config,
        Arc::clone(&v1.store) as Arc<dyn StoreBackend>,
        transport as Arc<dyn Transport>,
        host as Arc<dyn HostRuntime>,
        events as Arc<dyn EventPublisher>,
    )
    .unwrap();

    lifecycle.install().await.unwrap();
    let report = lifecycle.activate().await.unwrap();

    // Old tiles are dropped, not migrated
    let mut purged = report.purged.clone();
    purged.sort();
    assert_eq!(purged, vec!["app-v1", "tiles-v1"]);
    assert_eq!(v1.store.list_namespaces().await.unwrap(), vec!["app-v2"]);
}

#[tokio::test]
async fn test_failed_install_emits_no_takeover_signal() {
    let d = deployment("v2");
    d.transport.unroute("https://maps.example/");

    let err = d.lifecycle.install().await.unwrap_err();
    assert_matches!(err, Error::Install { .. });
    assert!(!d.host.skip_waiting_called());
    assert_eq!(d.events.events_of_type("InstallCompleted").len(), 0);
}

#[tokio::test]
async fn test_activation_on_host_without_preload_still_completes() {
    let d = deployment("v2");
    d.host.fail_preload(true);

    let report = d.lifecycle.activate().await.unwrap();
    assert!(!report.preload_enabled);
    assert!(d.host.claim_clients_called());
}

// =============================================================================
// Request Path Scenarios
// =============================================================================

#[tokio::test]
async fn test_tile_scenario_fetch_cache_then_offline_replay() {
    let d = deployment("v2");
    d.transport.route(TILE, FetchResponse::ok("tile bytes"));

    // Empty cache, reachable network: classified, fetched, written
    assert_eq!(
        d.engine.classify(&FetchRequest::new(TILE)),
        RequestClass::StandardTile
    );
    let first = d.engine.handle(&FetchRequest::new(TILE)).await.unwrap();
    assert_eq!(first.body().as_ref(), b"tile bytes");
    assert_eq!(d.store.len("tiles-v2"), 1);
    assert_eq!(d.transport.fetch_count(), 1);

    // Network unreachable: the cached entry is served without a fetch
    d.transport.set_offline(true);
    let second = d.engine.handle(&FetchRequest::new(TILE)).await.unwrap();
    assert_eq!(second.body().as_ref(), b"tile bytes");
    assert_eq!(d.transport.fetch_count(), 1);
}

#[tokio::test]
async fn test_tile_and_satellite_bounds_hold_under_traffic() {
    let mut config = WorkerConfig::for_origin(ORIGIN, "v2");
    config.tile_bound = 10;
    config.satellite_bound = 4;

    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(StaticTransport::new());
    let events = Arc::new(InMemoryEventCollector::new());
    let engine = WorkerEngine::new(
        config,
        Arc::clone(&store) as Arc<dyn StoreBackend>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        events as Arc<dyn EventPublisher>,
    )
    .unwrap();

    for i in 0..25 {
        let tile = format!("https://b.tile.openstreetmap.org/10/{i}/7.png");
        transport.route(&tile, FetchResponse::ok("t"));
        engine.handle(&FetchRequest::new(&tile)).await.unwrap();

        let sat = format!(
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/10/{i}/7"
        );
        transport.route(&sat, FetchResponse::ok("s"));
        engine.handle(&FetchRequest::new(&sat)).await.unwrap();

        // The bound holds after every completed write + trim cycle
        assert!(store.len("tiles-v2") <= 10);
        assert!(store.len("satellite-v2") <= 4);
    }

    // Survivors are the most recently inserted keys
    let keys = store.keys("satellite-v2").await.unwrap();
    assert_eq!(keys.len(), 4);
    assert!(keys[0].ends_with("/10/21/7"));
}

#[tokio::test]
async fn test_shell_asset_refresh_is_visible_offline() {
    let d = deployment("v2");
    d.lifecycle.install().await.unwrap();
    let css = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";

    // A redeploy changes the asset; a fetch must overwrite the cache
    d.transport.route(css, FetchResponse::ok("new css"));
    let fetched = d.engine.handle(&FetchRequest::new(css)).await.unwrap();
    assert_eq!(fetched.body().as_ref(), b"new css");

    d.transport.set_offline(true);
    let cached = d.engine.handle(&FetchRequest::new(css)).await.unwrap();
    assert_eq!(cached.body().as_ref(), b"new css");
}

#[tokio::test]
async fn test_offline_without_install_degrades_per_class() {
    let d = deployment("v2");
    d.transport.set_offline(true);

    // Navigation and tiles degrade to the sentinel
    let nav = d
        .engine
        .handle(&FetchRequest::navigation("https://maps.example/"))
        .await
        .unwrap();
    assert!(nav.is_error());

    let tile = d.engine.handle(&FetchRequest::new(TILE)).await.unwrap();
    assert!(tile.is_error());

    // The shell asset path fails loudly, flagging the broken install
    let err = d
        .engine
        .handle(&FetchRequest::new("https://maps.example/index.html"))
        .await
        .unwrap_err();
    assert_matches!(err, Error::AssetUnavailable { .. });
}

#[tokio::test]
async fn test_preload_response_wins_over_everything() {
    let d = deployment("v2");
    d.lifecycle.install().await.unwrap();
    d.transport.set_offline(true);

    let response = d
        .engine
        .handle_with_preload(
            &FetchRequest::navigation("https://maps.example/"),
            Some(FetchResponse::ok("preloaded document")),
        )
        .await
        .unwrap();
    assert_eq!(response.body().as_ref(), b"preloaded document");
}

#[tokio::test]
async fn test_concurrent_tile_requests_settle_within_bound() {
    let mut config = WorkerConfig::for_origin(ORIGIN, "v2");
    config.tile_bound = 8;

    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(StaticTransport::new());
    let events = Arc::new(InMemoryEventCollector::new());
    let engine = Arc::new(
        WorkerEngine::new(
            config,
            Arc::clone(&store) as Arc<dyn StoreBackend>,
            Arc::clone(&transport) as Arc<dyn Transport>,
            events as Arc<dyn EventPublisher>,
        )
        .unwrap(),
    );

    let urls: Vec<String> = (0..32)
        .map(|i| format!("https://c.tile.openstreetmap.org/12/{i}/5.png"))
        .collect();
    for url in &urls {
        transport.route(url, FetchResponse::ok("t"));
    }

    // In-flight writers may overshoot transiently; a final trim settles it
    let tasks: Vec<_> = urls
        .iter()
        .map(|url| {
            let engine = Arc::clone(&engine);
            let request = FetchRequest::new(url);
            tokio::spawn(async move { engine.handle(&request).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    trim_to_bound(store.as_ref(), "tiles-v2", 8).await.unwrap();
    assert!(store.len("tiles-v2") <= 8);
}

// =============================================================================
// Disk Store End-to-End
// =============================================================================

#[tokio::test]
async fn test_engine_over_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig::for_origin(ORIGIN, "v2");
    let disk_config = DiskStoreConfig {
        root: dir.path().to_path_buf(),
        compression_min_size: 64,
    };

    {
        let store = Arc::new(DiskStore::open(disk_config.clone()).await.unwrap());
        let transport = Arc::new(StaticTransport::new());
        transport.route(
            TILE,
            FetchResponse::ok("png").with_header("content-type", "image/png"),
        );
        let events = Arc::new(InMemoryEventCollector::new());
        let engine = WorkerEngine::new(
            config.clone(),
            store as Arc<dyn StoreBackend>,
            transport as Arc<dyn Transport>,
            events as Arc<dyn EventPublisher>,
        )
        .unwrap();
        engine.handle(&FetchRequest::new(TILE)).await.unwrap();
    }

    // A fresh process over the same directory serves the tile offline
    let store = Arc::new(DiskStore::open(disk_config).await.unwrap());
    let transport = Arc::new(StaticTransport::new());
    transport.set_offline(true);
    let events = Arc::new(InMemoryEventCollector::new());
    let engine = WorkerEngine::new(
        config,
        store as Arc<dyn StoreBackend>,
        transport as Arc<dyn Transport>,
        events as Arc<dyn EventPublisher>,
    )
    .unwrap();

    let response = engine.handle(&FetchRequest::new(TILE)).await.unwrap();
    assert_eq!(response.body().as_ref(), b"png");
    assert_eq!(response.header("content-type"), Some("image/png"));
}

// =============================================================================
// Trimmer Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After a trim, exactly min(count, bound) entries remain and they
    /// are the newest ones; a second trim deletes nothing.
    #[test]
    fn prop_trim_leaves_newest_entries(count in 0usize..40, bound in 1usize..20) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            for i in 0..count {
                store
                    .put("tiles-v2", &format!("k{i}"), FetchResponse::ok("x"))
                    .await
                    .unwrap();
            }

            let evicted = trim_to_bound(&store, "tiles-v2", bound).await.unwrap();
            prop_assert_eq!(evicted, count.saturating_sub(bound));

            let keys = store.keys("tiles-v2").await.unwrap();
            prop_assert_eq!(keys.len(), count.min(bound));
            if count > bound {
                // Oldest keys were the ones deleted
                let expected_first = format!("k{}", count - bound);
                prop_assert_eq!(keys.first().map(String::as_str), Some(expected_first.as_str()));
            }

            let again = trim_to_bound(&store, "tiles-v2", bound).await.unwrap();
            prop_assert_eq!(again, 0);
            Ok(())
        })?;
    }
}
