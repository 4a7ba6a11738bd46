//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source metadata, breaker thresholds,
//! cumulative request statistics and the traffic state of every
//! tracked backend host.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::metrics::{backend_states, request_stats};
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while any backend is banned.
    pub status: String,
    pub version: String,
    pub commit: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub thresholds: ThresholdsResponse,
    pub stats: StatsResponse,
    pub backends: Vec<BackendHealth>,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub routes: usize,
    pub backends: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ThresholdsResponse {
    pub max_req_per_sec: u64,
    pub max_err_per_sec: u64,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_rejected: u64,
}

#[derive(Serialize, Deserialize)]
pub struct BackendHealth {
    pub host: String,
    pub requests: u64,
    pub errors: u64,
    pub banned: bool,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backends = backend_states(&state);

    let status = if backends.iter().any(|b| b.banned) {
        "degraded"
    } else {
        "healthy"
    };
    let thresholds = state.proxy.thresholds();

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("WEEPROXY_GIT_SHORT").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: state.config.source.clone(),
            version: state.config.version.short().to_string(),
            loaded_ago_seconds: state.config.loaded_at.elapsed().as_secs(),
            routes: state.routes.len(),
            backends: state.proxy.registry().host_count(),
        },
        thresholds: ThresholdsResponse {
            max_req_per_sec: thresholds.max_req_per_sec,
            max_err_per_sec: thresholds.max_err_per_sec,
        },
        stats: request_stats(&state),
        backends,
    })
}
