//! Inventory item endpoints

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use validator::Validate;

use super::{cached_response, path_error, query_error};
use crate::api::middleware::{RequireAdmin, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, ValidatedJson};
use crate::domain::inventory::InventoryItemSummary;
use crate::infrastructure::services::{CreateInventoryItemRequest, UpdateInventoryItemRequest};

pub fn create_inventory_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/{id}", get(get_item).put(update_item).delete(delete_item))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub with_order: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemQuery {
    #[serde(default)]
    pub with_order: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemBody {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub order_id: Option<i64>,
}

/// GET /api/inventory?page&pageSize&withOrder
pub async fn list_items(
    _user: RequireUser,
    State(state): State<AppState>,
    query: Result<Query<ListItemsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(query_error)?;

    let page = state
        .inventory
        .list(query.page, query.page_size, query.with_order)
        .await?;

    Ok(cached_response(page))
}

/// GET /api/inventory/{id}?withOrder
pub async fn get_item(
    _user: RequireUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<GetItemQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(path_error)?;
    let Query(query) = query.map_err(query_error)?;

    let item = state.inventory.get(id, query.with_order).await?;
    Ok(cached_response(item))
}

/// POST /api/inventory
pub async fn create_item(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<InventoryItemBody>,
) -> Result<(StatusCode, Json<InventoryItemSummary>), ApiError> {
    let item = state
        .inventory
        .create(CreateInventoryItemRequest {
            name: body.name,
            quantity: body.quantity,
            location: body.location,
            order_id: body.order_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/inventory/{id}
pub async fn update_item(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    ValidatedJson(body): ValidatedJson<InventoryItemBody>,
) -> Result<Json<InventoryItemSummary>, ApiError> {
    let Path(id) = id.map_err(path_error)?;

    let item = state
        .inventory
        .update(
            id,
            UpdateInventoryItemRequest {
                name: body.name,
                quantity: body.quantity,
                location: body.location,
                order_id: body.order_id,
            },
        )
        .await?;

    Ok(Json(item))
}

/// DELETE /api/inventory/{id}
pub async fn delete_item(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(path_error)?;

    state.inventory.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
