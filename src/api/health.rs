//! Health check endpoints for Kubernetes probes

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Returns 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: None,
        }),
    )
}

/// Readiness with cache tier status
///
/// A missing remote tier is reported as degraded but still ready: reads fall
/// back to the local tier and the backing store.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = if state.remote_cache {
        HealthCheck {
            name: "remote_cache".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    } else {
        HealthCheck {
            name: "remote_cache".to_string(),
            status: HealthStatus::Degraded,
            message: Some("Running with the local cache tier only".to_string()),
        }
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: cache.status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: Some(vec![cache]),
        }),
    )
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}
