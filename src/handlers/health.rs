use axum::{response::Response, routing::get, Router};
use serde_json::json;

use crate::handlers::common::success_response;
use crate::handlers::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service healthy")),
    tag = "health"
)]
pub async fn health() -> Response {
    success_response(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
