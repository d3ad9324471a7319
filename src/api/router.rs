use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::auth;
use super::health;
use super::state::AppState;
use super::v1;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Registration and login are open; role assignment requires Admin
        .nest("/auth", auth::create_auth_router())
        .nest("/api", v1::create_api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
