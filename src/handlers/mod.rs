pub mod categories;
pub mod common;
pub mod containers;
pub mod health;
pub mod images;
pub mod items;
pub mod labels;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::mutators::{ContainerMutator, ImageMutator, ItemMutator};
use crate::services::{IngestionService, LabelService, VisionAnalyzer};
use crate::store::CollectionStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub items: Arc<ItemMutator>,
    pub containers: Arc<ContainerMutator>,
    pub images: Arc<ImageMutator>,
    pub ingestion: Arc<IngestionService>,
    pub labels: Arc<LabelService>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        analyzer: Arc<dyn VisionAnalyzer>,
        config: &AppConfig,
    ) -> Self {
        Self {
            items: Arc::new(ItemMutator::new(store.clone())),
            containers: Arc::new(ContainerMutator::new(store.clone())),
            images: Arc::new(ImageMutator::new(store.clone())),
            ingestion: Arc::new(IngestionService::new(
                store.clone(),
                analyzer,
                config.jpeg_quality,
            )),
            labels: Arc::new(LabelService::new(store, config.app_base_url.clone())),
        }
    }
}

/// Authenticated owner reference, forwarded by the frontend gateway in the
/// `X-User-Ref` header. Entities are stamped with it on creation.
pub struct OwnerRef(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerRef
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-ref")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| OwnerRef(value.to_string()))
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing X-User-Ref header".to_string())
            })
    }
}
