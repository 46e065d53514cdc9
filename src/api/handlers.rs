//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::cache::{CacheStore, KeyPattern, PruneReport};
use crate::error::{CacheError, Result};
use crate::models::{
    CounterRequest, CounterResponse, DeleteMatchedRequest, DeleteResponse, GetResponse,
    HealthResponse, InspectResponse, PruneRequest, RemovedResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The store serializes its own image access, so handlers share it
/// through a plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
}

impl AppState {
    /// Creates a new AppState with the given cache store.
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the cache store on the configured backing image.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(CacheStore::open(config.store.clone()))
    }
}

/// Runs a store operation on the blocking pool.
///
/// Store calls wait on a blocking lock that a reactive prune or an expiry
/// sweep can hold for up to the prune budget.
async fn run_blocking<T, F>(cache: Arc<CacheStore>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CacheStore) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&cache))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))?
}

/// Handler for PUT /set
///
/// Stores a JSON value with optional TTL (seconds). May prune first.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_secs);
    let SetRequest { key, value, .. } = req;
    let (key, stored) = run_blocking(state.cache, move |cache| {
        let stored = cache.write(&key, &value, ttl)?;
        Ok((key, stored))
    })
    .await?;

    Ok(Json(SetResponse::new(key, stored)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    match run_blocking(state.cache, move |cache| cache.read(&lookup)).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    if run_blocking(state.cache, move |cache| cache.delete(&target)).await? {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /incr/:key
///
/// Body is optional; the amount defaults to 1. Missing keys are 404.
pub async fn incr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> Result<Json<CounterResponse>> {
    let amount = body.map(|Json(req)| req.amount()).unwrap_or(1);
    let target = key.clone();
    let value = run_blocking(state.cache, move |cache| cache.increment(&target, amount)).await?;
    counter_response(key, value)
}

/// Handler for POST /decr/:key
pub async fn decr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> Result<Json<CounterResponse>> {
    let amount = body.map(|Json(req)| req.amount()).unwrap_or(1);
    let target = key.clone();
    let value = run_blocking(state.cache, move |cache| cache.decrement(&target, amount)).await?;
    counter_response(key, value)
}

fn counter_response(key: String, value: Option<i64>) -> Result<Json<CounterResponse>> {
    match value {
        Some(value) => Ok(Json(CounterResponse { key, value })),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for POST /delete_matched
pub async fn delete_matched_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteMatchedRequest>,
) -> Result<Json<RemovedResponse>> {
    let pattern = KeyPattern::glob(req.pattern);
    let removed = run_blocking(state.cache, move |cache| cache.delete_matched(&pattern)).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<StatusCode> {
    run_blocking(state.cache, |cache| cache.clear()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /cleanup
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<Json<RemovedResponse>> {
    let removed = run_blocking(state.cache, |cache| cache.cleanup()).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Handler for POST /prune
pub async fn prune_handler(
    State(state): State<AppState>,
    Json(req): Json<PruneRequest>,
) -> Result<Json<PruneReport>> {
    let max_time = req.max_time_ms.map(Duration::from_millis);
    let report = run_blocking(state.cache, move |cache| cache.prune(req.target_size, max_time)).await?;
    Ok(Json(report))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = run_blocking(state.cache, |cache| cache.stats()).await?;
    Ok(Json(stats.into()))
}

/// Handler for GET /inspect
pub async fn inspect_handler(State(state): State<AppState>) -> Result<Json<InspectResponse>> {
    let inspection = run_blocking(state.cache, |cache| cache.inspect()).await?;
    Ok(Json(inspection.into()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
