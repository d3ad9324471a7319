//! Versioned resource API under `/api`
//!
//! Every route requires a bearer token; writes additionally require `Admin`.

pub mod inventory;
pub mod orders;

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Router,
};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::infrastructure::services::Cached;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::create_orders_router())
        .nest("/inventory", inventory::create_inventory_router())
}

/// JSON body plus an `X-Cache: HIT|MISS` header
pub(crate) fn cached_response<T: Serialize>(cached: Cached<T>) -> Response {
    (
        [(X_CACHE, HeaderValue::from_static(cached.status.as_str()))],
        Json(cached.value),
    )
        .into_response()
}

pub(crate) fn query_error(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text()).with_code("invalid_query")
}

pub(crate) fn path_error(rejection: PathRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text()).with_code("invalid_path")
}
