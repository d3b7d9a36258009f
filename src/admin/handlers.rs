use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub chain_reachable: bool,
    pub wallet_address: String,
    pub total_requests: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let inner = state.inner.load_full();
    let chain_reachable = inner.gateway.is_healthy().await;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        chain_reachable,
        wallet_address: inner.service.wallet_address().to_string(),
        total_requests: inner.request_count.load(Ordering::Relaxed),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let inner = state.inner.load();
    let snapshot = inner.cache.current();
    Json(serde_json::json!({
        "total_donors": snapshot.total_donors,
        "fetched_at": snapshot.fetched_at,
        "age_secs": snapshot.age_secs(),
        "stale": inner.cache.is_stale(),
    }))
}

/// Force a full rescan, bypassing the staleness window.
pub async fn post_rescan(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let inner = state.inner.load_full();
    let snapshot = inner.cache.get_or_refresh(&inner.scanner, true).await?;
    Ok(Json(serde_json::json!({
        "status": "rescanned",
        "total_donors": snapshot.total_donors,
        "fetched_at": snapshot.fetched_at,
    })))
}
