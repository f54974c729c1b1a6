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
use crate::handlers::common::{created_response, success_response, PaginatedData};
use crate::handlers::items::ExpandParams;
use crate::handlers::{AppState, OwnerRef};
use crate::models::{BoundingBox, ContainerInput, ContainerPatch};
use crate::store::ListQuery;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_containers).post(create_container))
        .route(
            "/:id",
            get(get_container)
                .patch(update_container)
                .delete(delete_container),
        )
        .route("/:id/items", get(container_items))
        .route("/:id/history", get(container_history))
        .route("/:id/images", get(container_images))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ContainerListParams {
    /// Substring matched across label and notes
    pub q: Option<String>,
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
pub struct CreateContainerRequest {
    pub container_label: String,
    #[serde(default)]
    pub container_notes: String,
    pub primary_image: Option<String>,
    pub primary_image_bbox: Option<BoundingBox>,
}

impl CreateContainerRequest {
    fn into_input(self, user_ref: String) -> ContainerInput {
        ContainerInput {
            container_label: self.container_label,
            container_notes: self.container_notes,
            primary_image: self.primary_image,
            primary_image_bbox: self.primary_image_bbox,
            user_ref,
        }
    }
}

/// List or search containers.
#[utoipa::path(
    get,
    path = "/api/v1/containers",
    params(ContainerListParams),
    responses(
        (status = 200, description = "Containers returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn list_containers(
    State(state): State<AppState>,
    Query(params): Query<ContainerListParams>,
) -> Result<Response, ServiceError> {
    if let Some(q) = &params.q {
        let containers = state.services.containers.search(q).await?;
        return Ok(success_response(containers));
    }

    let mut query = ListQuery::new(params.page, params.per_page).with_sort("-created");
    if let Some(expand) = &params.expand {
        query = query.with_expand(expand.clone());
    }
    let (containers, total) = state.services.containers.list(&query).await?;
    Ok(success_response(PaginatedData {
        items: containers,
        total,
        page: params.page,
        per_page: params.per_page,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/containers",
    request_body = CreateContainerRequest,
    responses(
        (status = 201, description = "Container created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn create_container(
    State(state): State<AppState>,
    OwnerRef(user_ref): OwnerRef,
    Json(body): Json<CreateContainerRequest>,
) -> Result<Response, ServiceError> {
    let container = state
        .services
        .containers
        .create(body.into_input(user_ref))
        .await?;
    Ok(created_response(container))
}

#[utoipa::path(
    get,
    path = "/api/v1/containers/{id}",
    params(("id" = String, Path, description = "Container ID"), ExpandParams),
    responses(
        (status = 200, description = "Container returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn get_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExpandParams>,
) -> Result<Response, ServiceError> {
    let container = state
        .services
        .containers
        .get_by_id(&id, params.expand.as_deref())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Container with ID {id} not found")))?;
    Ok(success_response(container))
}

#[utoipa::path(
    patch,
    path = "/api/v1/containers/{id}",
    params(("id" = String, Path, description = "Container ID")),
    request_body = ContainerPatch,
    responses(
        (status = 200, description = "Container updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn update_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ContainerPatch>,
) -> Result<Response, ServiceError> {
    let container = state.services.containers.update(&id, patch).await?;
    Ok(success_response(container))
}

#[utoipa::path(
    delete,
    path = "/api/v1/containers/{id}",
    params(("id" = String, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Container deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn delete_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.containers.delete(&id).await?;
    Ok(success_response(json!({ "deleted_id": id })))
}

/// Items held by a container.
#[utoipa::path(
    get,
    path = "/api/v1/containers/{id}/items",
    params(("id" = String, Path, description = "Container ID")),
    responses((status = 200, description = "Items returned")),
    tag = "containers"
)]
pub async fn container_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let items = state.services.items.get_by_container(&id).await?;
    Ok(success_response(items))
}

/// Audit trail for a container, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/containers/{id}/history",
    params(("id" = String, Path, description = "Container ID")),
    responses((status = 200, description = "Audit records returned")),
    tag = "containers"
)]
pub async fn container_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let records = state.services.containers.history(&id).await?;
    Ok(success_response(records))
}

/// Current and former images of a container.
#[utoipa::path(
    get,
    path = "/api/v1/containers/{id}/images",
    params(("id" = String, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Images returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn container_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let images = state.services.images.get_by_container_id(&id).await?;
    Ok(success_response(images))
}
