use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;
use crate::handlers::common::{success_response, created_response, PaginatedData};
use crate::handlers::{AppState, OwnerRef};
use crate::models::{BoundingBox, ItemAttribute, ItemInput, ItemPatch};
use crate::mutators::ItemSearchFilters;
use crate::store::ListQuery;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route(
            "/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/:id/history", get(item_history))
        .route("/:id/images", get(item_images))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ItemListParams {
    /// Substring matched across label, name, notes, and manufacturer
    pub q: Option<String>,
    pub category_functional: Option<String>,
    pub category_specific: Option<String>,
    pub item_type: Option<String>,
    pub container: Option<String>,
    /// Relation to resolve inline (e.g. `primary_image`)
    pub expand: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    30
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub item_label: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_notes: String,
    pub category_functional: String,
    pub category_specific: String,
    pub item_type: String,
    #[serde(default)]
    pub item_manufacturer: String,
    #[serde(default)]
    pub item_attributes: Vec<ItemAttribute>,
    pub container: Option<String>,
    pub primary_image: Option<String>,
    pub primary_image_bbox: Option<BoundingBox>,
}

impl CreateItemRequest {
    fn into_input(self, user_ref: String) -> ItemInput {
        ItemInput {
            item_label: self.item_label,
            item_name: self.item_name,
            item_notes: self.item_notes,
            category_functional: self.category_functional,
            category_specific: self.category_specific,
            item_type: self.item_type,
            item_manufacturer: self.item_manufacturer,
            item_attributes: self.item_attributes,
            container: self.container,
            primary_image: self.primary_image,
            primary_image_bbox: self.primary_image_bbox,
            user_ref,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpandParams {
    pub expand: Option<String>,
}

/// List or search items.
///
/// With `q` or any exact filter this runs a capped search (500 results,
/// store-default order); otherwise it returns a newest-first page.
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ItemListParams),
    responses(
        (status = 200, description = "Items returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemListParams>,
) -> Result<Response, ServiceError> {
    let filters = ItemSearchFilters {
        category_functional: params.category_functional.clone(),
        category_specific: params.category_specific.clone(),
        item_type: params.item_type.clone(),
        container: params.container.clone(),
    };
    let has_filters = params.q.is_some()
        || filters.category_functional.is_some()
        || filters.category_specific.is_some()
        || filters.item_type.is_some()
        || filters.container.is_some();

    if has_filters {
        let items = state
            .services
            .items
            .search(params.q.as_deref().unwrap_or(""), &filters)
            .await?;
        return Ok(success_response(items));
    }

    let mut query = ListQuery::new(params.page, params.per_page).with_sort("-created");
    if let Some(expand) = &params.expand {
        query = query.with_expand(expand.clone());
    }
    let (items, total) = state.services.items.list(&query).await?;
    Ok(success_response(PaginatedData {
        items,
        total,
        page: params.page,
        per_page: params.per_page,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    OwnerRef(user_ref): OwnerRef,
    Json(body): Json<CreateItemRequest>,
) -> Result<Response, ServiceError> {
    let item = state
        .services
        .items
        .create(body.into_input(user_ref))
        .await?;
    Ok(created_response(item))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item ID"), ExpandParams),
    responses(
        (status = 200, description = "Item returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExpandParams>,
) -> Result<Response, ServiceError> {
    let item = state
        .services
        .items
        .get_by_id(&id, params.expand.as_deref())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Item with ID {id} not found")))?;
    Ok(success_response(item))
}

#[utoipa::path(
    patch,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item ID")),
    request_body = ItemPatch,
    responses(
        (status = 200, description = "Item updated"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> Result<Response, ServiceError> {
    let item = state.services.items.update(&id, patch).await?;
    Ok(success_response(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.items.delete(&id).await?;
    Ok(success_response(json!({ "deleted_id": id })))
}

/// Audit trail for an item, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/history",
    params(("id" = String, Path, description = "Item ID")),
    responses((status = 200, description = "Audit records returned")),
    tag = "items"
)]
pub async fn item_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let records = state.services.items.history(&id).await?;
    Ok(success_response(records))
}

/// Current and former images of an item.
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/images",
    params(("id" = String, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Images returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn item_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let images = state.services.images.get_by_item_id(&id).await?;
    Ok(success_response(images))
}
