//! `GET /metrics` and `GET /metrics/{name}` endpoint handlers.
//!
//! `/metrics` returns every counter at once: the proxy-wide request
//! outcomes and the live traffic state of each backend host.
//! `/metrics/{name}` returns one metric as a list of measurements; the
//! `backend.*` metrics carry one measurement per host, tagged with it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::health::{BackendHealth, StatsResponse};
use crate::server::AppState;

pub const METRIC_NAMES: &[&str] = &[
    "requests.forwarded",
    "requests.failed",
    "requests.rejected",
    "uptime.seconds",
    "backend.requests",
    "backend.errors",
    "backend.banned",
];

#[derive(Serialize, Deserialize)]
pub struct MetricsResponse {
    pub names: Vec<String>,
    pub requests: StatsResponse,
    pub backends: Vec<BackendHealth>,
}

#[derive(Serialize, Deserialize)]
pub struct MetricDetailResponse {
    pub name: String,
    pub measurements: Vec<MetricMeasurement>,
}

#[derive(Serialize, Deserialize)]
pub struct MetricMeasurement {
    pub statistic: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl MetricMeasurement {
    fn new(statistic: &str, value: f64) -> Self {
        Self {
            statistic: statistic.to_string(),
            value,
            host: None,
        }
    }
}

pub(crate) fn request_stats(state: &AppState) -> StatsResponse {
    StatsResponse {
        requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
        requests_failed: state.stats.failed.load(Ordering::Relaxed),
        requests_rejected: state.stats.rejected.load(Ordering::Relaxed),
    }
}

pub(crate) fn backend_states(state: &AppState) -> Vec<BackendHealth> {
    state
        .proxy
        .registry()
        .snapshots()
        .into_iter()
        .map(|(host, snap)| BackendHealth {
            host,
            requests: snap.requests,
            errors: snap.errors,
            banned: snap.banned,
        })
        .collect()
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        names: METRIC_NAMES.iter().map(ToString::to_string).collect(),
        requests: request_stats(&state),
        backends: backend_states(&state),
    })
}

#[allow(clippy::cast_precision_loss)]
pub async fn metric_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MetricDetailResponse>, StatusCode> {
    let per_host = |statistic: &str, value: fn(&BackendHealth) -> f64| -> Vec<MetricMeasurement> {
        backend_states(&state)
            .iter()
            .map(|b| MetricMeasurement {
                host: Some(b.host.clone()),
                ..MetricMeasurement::new(statistic, value(b))
            })
            .collect()
    };

    let stats = request_stats(&state);
    let measurements = match name.as_str() {
        "requests.forwarded" => vec![MetricMeasurement::new("COUNT", stats.requests_forwarded as f64)],
        "requests.failed" => vec![MetricMeasurement::new("COUNT", stats.requests_failed as f64)],
        "requests.rejected" => vec![MetricMeasurement::new("COUNT", stats.requests_rejected as f64)],
        "uptime.seconds" => vec![MetricMeasurement::new(
            "VALUE",
            state.start_time.elapsed().as_secs_f64(),
        )],
        "backend.requests" => per_host("VALUE", |b| b.requests as f64),
        "backend.errors" => per_host("VALUE", |b| b.errors as f64),
        "backend.banned" => per_host("VALUE", |b| if b.banned { 1.0 } else { 0.0 }),
        _ => return Err(StatusCode::NOT_FOUND),
    };

    Ok(Json(MetricDetailResponse { name, measurements }))
}
