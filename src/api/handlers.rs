//! API Handlers
//!
//! HTTP request handlers for the operator admin endpoints. Cached values
//! themselves are never served here.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheService, CacheStats};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, HealthResponse, InvalidateRequest, InvalidateResponse, MetadataResponse,
};
use crate::store::BackingStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache service shared with the rest of the process
    pub cache: CacheService,
}

impl AppState {
    /// Creates a new AppState around an existing service.
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration over the given store.
    pub fn from_config(config: &Config, store: Arc<dyn BackingStore>) -> Self {
        Self::new(CacheService::new(config, store))
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats())
}

/// Handler for POST /stats/reset
///
/// Returns the fresh snapshot after the reset.
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    state.cache.reset_stats();
    Json(state.cache.get_stats())
}

/// Handler for DELETE /keys/:key
///
/// Deleting an absent key succeeds with `removed: false`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let removed = state.cache.delete(&key).await;
    Json(DeleteResponse::new(state.cache.codec().build_key(&key), removed))
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.invalidate_pattern(&req.pattern).await;
    Ok(Json(InvalidateResponse::new(req.pattern, removed)))
}

/// Handler for GET /keys/:key/meta
pub async fn metadata_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MetadataResponse>> {
    let full_key = state.cache.codec().build_key(&key);
    let metadata = state
        .cache
        .metadata(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(full_key.clone()))?;

    Ok(Json(MetadataResponse {
        key: full_key,
        metadata,
    }))
}
