//! Liveness and readiness probes. Plain JSON, no signing.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// What `GET /api/health` reports.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// `mongo`, `postgres` or `memory`.
    pub store: &'static str,
    pub store_healthy: bool,
    /// Sessions currently held in memory, expired ones included until the next sweep.
    pub sessions: usize,
    pub uptime_seconds: u64,
    pub version: &'static str,
}

/// `GET /health`: answers as long as the process serves requests.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/health`: 503 when the organization store does not answer.
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let store_healthy = state.store.health().await;
    let report = HealthReport {
        status: if store_healthy { "ok" } else { "unhealthy" },
        store: state.store.backend(),
        store_healthy,
        sessions: state.sessions.count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    };

    let code = match store_healthy {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}
