//! POS Cache - admin server for the cache coordination layer
//!
//! Runs the cache service over an in-process store with the stale-record
//! cleaner in the background and the operator admin API in front.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pos_cache::api::{create_router, AppState};
use pos_cache::{spawn_cleanup_task, CacheService, Config, MemoryStore, WarmupEntry};

/// Main entry point for the cache admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache service over the backing store
/// 4. Warm the service-info entry
/// 5. Start the background cleanup task
/// 6. Serve the admin API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pos_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting POS cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: namespace={}, default_ttl={}s, eviction={}, max_tracked_keys={}, port={}",
        config.namespace,
        config.default_ttl,
        config.eviction_strategy.as_str(),
        config.max_tracked_keys,
        config.server_port
    );

    let cache = CacheService::new(&config, Arc::new(MemoryStore::new()));
    info!("Cache service initialized");

    let namespace = config.namespace.clone();
    let strategy = config.eviction_strategy;
    cache
        .warmup(vec![WarmupEntry::new("system:service_info", None, move || async move {
            Ok(serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "namespace": namespace,
                "eviction_strategy": strategy,
                "started_at": chrono::Utc::now().to_rfc3339(),
            }))
        })])
        .await;

    let cleanup_handle = spawn_cleanup_task(cache.clone(), config.cleanup_interval);
    info!("Background cleanup task started");

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("admin server failed")?;

    let stats = cache.get_stats();
    info!(
        "Server shutdown complete: hits={}, misses={}, hit_rate={:.3}, errors={}",
        stats.hits, stats.misses, stats.hit_rate, stats.errors
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
