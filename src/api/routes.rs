//! API Routes
//!
//! Configures the Axum router with the operator admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, health_handler, invalidate_handler, metadata_handler, reset_stats_handler,
    stats_handler, AppState,
};

/// Creates the admin router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Cache statistics snapshot
/// - `POST /stats/reset` - Zero the counters
/// - `DELETE /keys/:key` - Delete one entry
/// - `GET /keys/:key/meta` - Metadata for a live entry
/// - `POST /invalidate` - Delete entries matching a glob pattern
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route("/keys/:key", delete(delete_handler))
        .route("/keys/:key/meta", get(metadata_handler))
        .route("/invalidate", post(invalidate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
