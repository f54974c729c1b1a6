//! Stockroom API Library
//!
//! Backend service for a photo-driven inventory manager: CRUD over items,
//! containers, images, and labels against a hosted collection store, plus an
//! AI-assisted image-ingestion workflow with content-hash deduplication.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod mutators;
pub mod openapi;
pub mod services;
pub mod store;

use axum::extract::DefaultBodyLimit;
use axum::Router;

/// Uploads are re-encoded server-side; cap the inbound body well above a
/// typical phone photo.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// Full v1 API surface.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/items", handlers::items::router())
        .nest("/containers", handlers::containers::router())
        .nest(
            "/images",
            handlers::images::router().layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest("/categories", handlers::categories::router())
        .nest("/labels", handlers::labels::router())
        .merge(handlers::health::router())
}
