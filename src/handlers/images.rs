use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::handlers::common::{success_response, PaginatedData};
use crate::handlers::{AppState, OwnerRef};
use crate::models::AnalysisStatus;
use crate::store::{Filter, ListQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_images))
        .route("/process", post(process_upload))
        .route("/:id", get(get_image).delete(delete_image))
        .route("/:id/process", post(process_existing))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ImageListParams {
    /// Filter by analysis status (pending, processing, completed, failed)
    pub status: Option<String>,
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

#[utoipa::path(
    get,
    path = "/api/v1/images",
    params(ImageListParams),
    responses(
        (status = 200, description = "Images returned"),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "images"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ImageListParams>,
) -> Result<Response, ServiceError> {
    let mut query = ListQuery::new(params.page, params.per_page).with_sort("-created");
    if let Some(status) = &params.status {
        let status = AnalysisStatus::from_str(status).map_err(|_| {
            ServiceError::BadRequest(format!("unknown analysis status: {status}"))
        })?;
        query = query.with_filter(Filter::eq("analysis_status", status.to_string()));
    }
    let (images, total) = state.services.images.list(&query).await?;
    Ok(success_response(PaginatedData {
        items: images,
        total,
        page: params.page,
        per_page: params.per_page,
    }))
}

/// Upload a photo and run the full ingestion workflow on it.
///
/// Multipart body with a single `file` part. Always creates a new image
/// record; analysis is deduplicated by content hash.
#[utoipa::path(
    post,
    path = "/api/v1/images/process",
    responses(
        (status = 200, description = "Image processed"),
        (status = 400, description = "No file provided or undecodable image", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 502, description = "Analysis API failed", body = crate::errors::ErrorResponse)
    ),
    tag = "images"
)]
pub async fn process_upload(
    State(state): State<AppState>,
    OwnerRef(user_ref): OwnerRef,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .unwrap_or("upload.jpg")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServiceError::BadRequest(format!("failed to read upload: {e}")))?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ServiceError::BadRequest("No file provided".to_string()))?;

    let outcome = state
        .services
        .ingestion
        .process_upload(&filename, bytes, &user_ref)
        .await?;
    Ok(success_response(outcome))
}

/// Re-run analysis for an existing image (the retry path).
#[utoipa::path(
    post,
    path = "/api/v1/images/{id}/process",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image processed"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Analysis API failed", body = crate::errors::ErrorResponse)
    ),
    tag = "images"
)]
pub async fn process_existing(
    State(state): State<AppState>,
    OwnerRef(user_ref): OwnerRef,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .ingestion
        .process_existing(&id, &user_ref)
        .await?;
    Ok(success_response(outcome))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "images"
)]
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let image = state
        .services
        .images
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Image with ID {id} not found")))?;
    let file_url = state.services.images.file_url(&image);
    Ok(success_response(json!({ "image": image, "file_url": file_url })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "images"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.images.delete(&id).await?;
    Ok(success_response(json!({ "deleted_id": id })))
}
