use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::{
    AnalysisStatus, Container, Image, ImagePatch, ImageType, Item, ItemImageMapping,
    ContainerImageMapping,
};
use crate::mutators::{Records, SEARCH_PAGE_CAP};
use crate::store::{collections, CollectionStore, Filter, ListQuery, StoredFile};

pub struct ImageMutator {
    store: Arc<dyn CollectionStore>,
    records: Records<Image>,
    items: Records<Item>,
    containers: Records<Container>,
    item_history: Records<ItemImageMapping>,
    container_history: Records<ContainerImageMapping>,
}

impl ImageMutator {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            records: Records::new(store.clone(), collections::IMAGES),
            items: Records::new(store.clone(), collections::ITEMS),
            containers: Records::new(store.clone(), collections::CONTAINERS),
            item_history: Records::new(store.clone(), collections::ITEM_IMAGES),
            container_history: Records::new(store.clone(), collections::CONTAINER_IMAGES),
            store,
        }
    }

    /// Creates a new image record around an uploaded file. Uploads always
    /// create a new record; deduplication applies only to analysis, never to
    /// storage.
    #[instrument(skip(self, bytes))]
    pub async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
        file_hash: &str,
        user_ref: &str,
    ) -> Result<Image, ServiceError> {
        let fields = json!({
            "file_hash": file_hash,
            "image_type": ImageType::Unprocessed,
            "analysis_status": AnalysisStatus::Pending,
            "user_ref": user_ref,
        });
        self.records
            .create_with_file(
                fields,
                StoredFile {
                    field: "file".to_string(),
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    bytes,
                },
            )
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Image>, ServiceError> {
        self.records.get(id, None).await
    }

    pub async fn require(&self, id: &str) -> Result<Image, ServiceError> {
        self.records.require(id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<(Vec<Image>, u64), ServiceError> {
        self.records.page(query).await
    }

    pub async fn update(&self, id: &str, patch: ImagePatch) -> Result<Image, ServiceError> {
        self.records.update(id, serde_json::to_value(&patch)?).await
    }

    pub async fn update_analysis_status(
        &self,
        id: &str,
        status: AnalysisStatus,
    ) -> Result<Image, ServiceError> {
        self.update(
            id,
            ImagePatch {
                analysis_status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        // Require first so an absent id reports NotFound with the image context.
        self.records.require(id).await?;
        self.records.delete(id).await
    }

    pub async fn get_by_status(
        &self,
        status: AnalysisStatus,
    ) -> Result<Vec<Image>, ServiceError> {
        let query = ListQuery::new(1, 100)
            .with_filter(Filter::eq("analysis_status", status.to_string()));
        let (images, _) = self.records.page(&query).await?;
        Ok(images)
    }

    /// Downloads the stored binary for an image.
    pub async fn download(&self, image: &Image) -> Result<Vec<u8>, ServiceError> {
        self.store
            .download_file(collections::IMAGES, &image.id, &image.file)
            .await
    }

    /// Public retrieval URL for an image's stored file.
    pub fn file_url(&self, image: &Image) -> String {
        self.store
            .file_url(collections::IMAGES, &image.id, &image.file)
    }

    /// All images associated with an item: its current primary image followed
    /// by the history mappings, deduplicated, newest mapping first.
    pub async fn get_by_item_id(&self, item_id: &str) -> Result<Vec<Image>, ServiceError> {
        let item = self.items.require(item_id).await?;
        let mapped: Vec<String> = {
            let query = ListQuery::new(1, SEARCH_PAGE_CAP)
                .with_filter(Filter::eq("item_ref", item_id))
                .with_sort("-created");
            let (mappings, _) = self.item_history.page(&query).await?;
            mappings.into_iter().map(|m| m.image_ref).collect()
        };
        self.collect_images(item.primary_image, mapped).await
    }

    /// All images associated with a container, same shape as
    /// [`Self::get_by_item_id`].
    pub async fn get_by_container_id(
        &self,
        container_id: &str,
    ) -> Result<Vec<Image>, ServiceError> {
        let container = self.containers.require(container_id).await?;
        let mapped: Vec<String> = {
            let query = ListQuery::new(1, SEARCH_PAGE_CAP)
                .with_filter(Filter::eq("container_ref", container_id))
                .with_sort("-created");
            let (mappings, _) = self.container_history.page(&query).await?;
            mappings.into_iter().map(|m| m.image_ref).collect()
        };
        self.collect_images(container.primary_image, mapped).await
    }

    async fn collect_images(
        &self,
        primary: Option<String>,
        mapped: Vec<String>,
    ) -> Result<Vec<Image>, ServiceError> {
        let mut images = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for id in primary.into_iter().chain(mapped) {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(image) = self.records.get(&id, None).await? {
                images.push(image);
            }
        }
        Ok(images)
    }
}
