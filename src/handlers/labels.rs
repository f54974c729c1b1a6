use axum::{
    extract::State,
    response::Response,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::handlers::{AppState, OwnerRef};
use crate::models::{LabelFormat, LabelTarget};

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate_label))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateLabelRequest {
    pub target_id: String,
    pub target_type: LabelTarget,
    pub format: LabelFormat,
}

/// Render a printable QR label for an item or container.
#[utoipa::path(
    post,
    path = "/api/v1/labels/generate",
    request_body = GenerateLabelRequest,
    responses(
        (status = 200, description = "Label generated", body = crate::services::GeneratedLabel),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Target not found", body = crate::errors::ErrorResponse)
    ),
    tag = "labels"
)]
pub async fn generate_label(
    State(state): State<AppState>,
    OwnerRef(_user_ref): OwnerRef,
    Json(body): Json<GenerateLabelRequest>,
) -> Result<Response, ServiceError> {
    let label = state
        .services
        .labels
        .generate(&body.target_id, body.target_type, body.format)
        .await?;
    Ok(success_response(label))
}
