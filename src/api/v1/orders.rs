//! Order endpoints

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::{cached_response, path_error, query_error};
use crate::api::middleware::{RequireAdmin, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, ValidatedJson};
use crate::domain::order::OrderSummary;
use crate::infrastructure::services::{CreateOrderRequest, UpdateOrderRequest};

pub fn create_orders_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order).put(update_order).delete(delete_order))
        .route("/{id}/items/{item_id}", delete(remove_item).post(add_item))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub with_items: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrderQuery {
    #[serde(default)]
    pub with_items: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody {
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    pub date_placed: Option<DateTime<Utc>>,
}

/// GET /api/orders?page&pageSize&withItems
pub async fn list_orders(
    _user: RequireUser,
    State(state): State<AppState>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(query_error)?;

    let page = state
        .orders
        .list(query.page, query.page_size, query.with_items)
        .await?;

    Ok(cached_response(page))
}

/// GET /api/orders/{id}?withItems
pub async fn get_order(
    _user: RequireUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<GetOrderQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(path_error)?;
    let Query(query) = query.map_err(query_error)?;

    let order = state.orders.get(id, query.with_items).await?;
    Ok(cached_response(order))
}

/// POST /api/orders
pub async fn create_order(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<OrderBody>,
) -> Result<(StatusCode, Json<OrderSummary>), ApiError> {
    let order = state
        .orders
        .create(CreateOrderRequest {
            customer_name: body.customer_name,
            date_placed: body.date_placed,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /api/orders/{id}
pub async fn update_order(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    ValidatedJson(body): ValidatedJson<OrderBody>,
) -> Result<Json<OrderSummary>, ApiError> {
    let Path(id) = id.map_err(path_error)?;

    let order = state
        .orders
        .update(
            id,
            UpdateOrderRequest {
                customer_name: body.customer_name,
                date_placed: body.date_placed,
            },
        )
        .await?;

    Ok(Json(order))
}

/// DELETE /api/orders/{id}
pub async fn delete_order(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(path_error)?;

    state.orders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/orders/{id}/items/{item_id}
pub async fn add_item(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<OrderSummary>, ApiError> {
    let Path((id, item_id)) = ids.map_err(path_error)?;

    let order = state.orders.add_item(id, item_id).await?;
    Ok(Json(order))
}

/// DELETE /api/orders/{id}/items/{item_id}
pub async fn remove_item(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<OrderSummary>, ApiError> {
    let Path((id, item_id)) = ids.map_err(path_error)?;

    let order = state.orders.remove_item(id, item_id).await?;
    Ok(Json(order))
}
