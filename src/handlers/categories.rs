use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::str::FromStr;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::handlers::AppState;
use crate::services::CategoryAxis;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/search", get(search_categories))
}

/// Distinct category values across all items, sorted per axis.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses((status = 200, description = "Category library returned", body = crate::mutators::CategoryLibrary)),
    tag = "categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let library = state.services.items.get_distinct_categories().await?;
    Ok(success_response(library))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CategorySearchParams {
    pub q: String,
    /// One of `functional`, `specific`, `item_type`
    pub axis: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/search",
    params(CategorySearchParams),
    responses(
        (status = 200, description = "Matching category values returned"),
        (status = 400, description = "Unknown axis", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn search_categories(
    State(state): State<AppState>,
    Query(params): Query<CategorySearchParams>,
) -> Result<Response, ServiceError> {
    let axis = CategoryAxis::from_str(&params.axis)
        .map_err(|_| ServiceError::BadRequest(format!("unknown category axis: {}", params.axis)))?;
    let values = state
        .services
        .ingestion
        .search_categories(&params.q, axis)
        .await?;
    Ok(success_response(values))
}
