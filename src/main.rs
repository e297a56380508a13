//! TileVault Daemon
//!
//! Embeds the cache worker engine behind a local HTTP listener.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TileVault Daemon                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Listener   │───▶│    Worker    │───▶│    Store /   │       │
//! │  │  (intercept) │    │    Engine    │    │   Transport  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Startup runs install (fatal on any shell-asset failure) and activate
//! (purges stale cache generations) before the listener accepts traffic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tilevault::adapters::{
    DiskStore, DiskStoreConfig, HttpTransport, HttpTransportConfig, LoggingEventPublisher,
    LoggingHostRuntime, MemoryStore,
};
use tilevault::domain::ports::{EventPublisher, HostRuntime, StoreBackend, Transport};
use tilevault::{Lifecycle, WorkerConfig, WorkerEngine, WorkerMetrics};

// =============================================================================
// CLI Arguments
// =============================================================================

/// TileVault - offline cache worker for tile map applications
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker listener bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8090")]
    listen_addr: String,

    /// Origin the application shell is served from
    #[arg(long, env = "APP_ORIGIN", default_value = "http://localhost:8000")]
    app_origin: String,

    /// Cache generation version tag
    #[arg(long, env = "CACHE_VERSION", default_value = "v2")]
    cache_version: String,

    /// Cache directory for the disk store
    #[arg(long, env = "CACHE_DIR", default_value = "/var/cache/tilevault")]
    cache_dir: String,

    /// Use the in-memory store instead of the disk store
    #[arg(long, env = "IN_MEMORY")]
    in_memory: bool,

    /// Entry bound for the standard tile namespace
    #[arg(long, env = "TILE_BOUND", default_value = "2000")]
    tile_bound: usize,

    /// Entry bound for the satellite tile namespace
    #[arg(long, env = "SATELLITE_BOUND", default_value = "800")]
    satellite_bound: usize,

    /// Upstream fetch timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECONDS", default_value = "30")]
    upstream_timeout_seconds: u64,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting TileVault");
    info!("  App origin: {}", args.app_origin);
    info!("  Cache version: {}", args.cache_version);
    info!(
        "  Store: {}",
        if args.in_memory {
            "in-memory".to_string()
        } else {
            args.cache_dir.clone()
        }
    );
    info!("  Tile bound: {}", args.tile_bound);
    info!("  Satellite bound: {}", args.satellite_bound);

    let mut config = WorkerConfig::for_origin(&args.app_origin, &args.cache_version);
    config.tile_bound = args.tile_bound;
    config.satellite_bound = args.satellite_bound;

    // Assemble adapters
    let store: Arc<dyn StoreBackend> = if args.in_memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            DiskStore::open(DiskStoreConfig {
                root: args.cache_dir.clone().into(),
                ..Default::default()
            })
            .await
            .context("failed to open disk store")?,
        )
    };

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(HttpTransportConfig {
            timeout: Duration::from_secs(args.upstream_timeout_seconds),
            ..Default::default()
        })
        .context("failed to build HTTP transport")?,
    );

    let host: Arc<dyn HostRuntime> = Arc::new(LoggingHostRuntime::new());
    let events: Arc<dyn EventPublisher> = Arc::new(LoggingEventPublisher::new());

    // Lifecycle: install is all-or-nothing and aborts startup on failure
    let lifecycle = Lifecycle::new(
        config.clone(),
        Arc::clone(&store),
        Arc::clone(&transport),
        host,
        Arc::clone(&events),
    )?;
    lifecycle.install().await.context("shell install failed")?;
    let report = lifecycle.activate().await.context("activation failed")?;
    info!(
        purged = report.purged.len(),
        preload = report.preload_enabled,
        "worker activated"
    );

    let engine = Arc::new(WorkerEngine::new(config, store, transport, events)?);

    let shutdown = CancellationToken::new();

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics = engine.metrics();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Cancel on ctrl-c
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown_signal.cancel();
        }
    });

    run_worker_server(&args.listen_addr, engine, args.app_origin, shutdown).await?;

    info!("TileVault shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Worker Server
// =============================================================================

async fn run_worker_server(
    addr: &str,
    engine: Arc<WorkerEngine>,
    origin: String,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn worker_handler(
        req: Request<hyper::body::Incoming>,
        engine: Arc<WorkerEngine>,
        origin: Arc<str>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        // Absolute-form targets (proxy style) carry the full URL; anything
        // else is resolved against the configured app origin
        let url = if req.uri().scheme().is_some() {
            req.uri().to_string()
        } else {
            let origin = origin.trim_end_matches('/');
            format!("{}{}", origin, req.uri())
        };

        let navigation = req
            .headers()
            .get("sec-fetch-mode")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("navigate"))
            .unwrap_or(false);

        let request = if navigation {
            tilevault::FetchRequest::navigation(url)
        } else {
            tilevault::FetchRequest::new(url)
        };

        let response = match engine.handle(&request).await {
            Ok(resp) if resp.is_error() => Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(Full::new(Bytes::from("unavailable offline")))
                .unwrap(),
            Ok(resp) => {
                let status = StatusCode::from_u16(resp.status()).unwrap_or(StatusCode::OK);
                let mut builder = Response::builder().status(status);
                for (name, value) in resp.headers() {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder
                    .body(Full::new(resp.body().clone()))
                    .unwrap_or_else(|_| {
                        Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Full::new(Bytes::from("bad upstream headers")))
                            .unwrap()
                    })
            }
            Err(e) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(e.to_string())))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr.parse().context("invalid worker listener address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind worker listener")?;
    let origin: Arc<str> = origin.into();

    info!("Worker listening on {}", addr);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted.context("worker listener accept error")?,
            _ = shutdown.cancelled() => break,
        };

        let io = TokioIo::new(stream);
        let engine = Arc::clone(&engine);
        let origin = Arc::clone(&origin);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                worker_handler(req, Arc::clone(&engine), Arc::clone(&origin))
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Worker connection error: {}", e);
            }
        });
    }

    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> anyhow::Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn health_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/healthz" | "/livez" | "/readyz" => Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("ok")))
                .unwrap(),
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr.parse().context("invalid health server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind health server")?;

    info!("Health server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("health server accept error")?;

        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(health_handler))
                .await
            {
                tracing::error!("Health server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, metrics: Arc<WorkerMetrics>) -> anyhow::Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, TextEncoder};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    // Register metrics
    let requests = prometheus::register_int_gauge_vec!(
        "tilevault_requests_total",
        "Requests handled, by class",
        &["class"]
    )
    .context("metric registration failed")?;
    let cache_hits = prometheus::register_int_gauge!(
        "tilevault_cache_hits_total",
        "Tile cache hits"
    )?;
    let cache_misses = prometheus::register_int_gauge!(
        "tilevault_cache_misses_total",
        "Tile cache misses"
    )?;
    let network_fetches = prometheus::register_int_gauge!(
        "tilevault_network_fetches_total",
        "Network fetch attempts"
    )?;
    let network_failures = prometheus::register_int_gauge!(
        "tilevault_network_failures_total",
        "Network fetch failures"
    )?;
    let entries_evicted = prometheus::register_int_gauge!(
        "tilevault_entries_evicted_total",
        "Entries evicted from bounded namespaces"
    )?;
    let error_responses = prometheus::register_int_gauge!(
        "tilevault_error_responses_total",
        "Opaque error responses returned"
    )?;

    let addr: SocketAddr = addr.parse().context("invalid metrics server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind metrics server")?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("metrics server accept error")?;

        let io = TokioIo::new(stream);
        let metrics = Arc::clone(&metrics);
        let requests = requests.clone();
        let cache_hits = cache_hits.clone();
        let cache_misses = cache_misses.clone();
        let network_fetches = network_fetches.clone();
        let network_failures = network_failures.clone();
        let entries_evicted = entries_evicted.clone();
        let error_responses = error_responses.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let snapshot = metrics.snapshot();
                requests
                    .with_label_values(&["navigation"])
                    .set(snapshot.navigation_requests as i64);
                requests
                    .with_label_values(&["shell_asset"])
                    .set(snapshot.shell_requests as i64);
                requests
                    .with_label_values(&["standard_tile"])
                    .set(snapshot.tile_requests as i64);
                requests
                    .with_label_values(&["satellite_tile"])
                    .set(snapshot.satellite_requests as i64);
                requests
                    .with_label_values(&["fallback"])
                    .set(snapshot.fallback_requests as i64);
                cache_hits.set(snapshot.cache_hits as i64);
                cache_misses.set(snapshot.cache_misses as i64);
                network_fetches.set(snapshot.network_fetches as i64);
                network_failures.set(snapshot.network_failures as i64);
                entries_evicted.set(snapshot.entries_evicted as i64);
                error_responses.set(snapshot.error_responses as i64);

                async move {
                    let response = match req.uri().path() {
                        "/metrics" => {
                            let encoder = TextEncoder::new();
                            let metric_families = prometheus::gather();
                            let mut buffer = Vec::new();
                            if encoder.encode(&metric_families, &mut buffer).is_err() {
                                buffer.clear();
                            }

                            Response::builder()
                                .status(StatusCode::OK)
                                .header("Content-Type", encoder.format_type())
                                .body(Full::new(Bytes::from(buffer)))
                                .unwrap()
                        }
                        _ => Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Full::new(Bytes::from("not found")))
                            .unwrap(),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
