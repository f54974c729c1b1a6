use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::{AnalysisResult, ImageMetadata, ImageType};
use crate::mutators::Records;
use crate::store::{collections, CollectionStore, Filter};

/// Mutator for the analysis cache: one entry per content hash.
pub struct ImageMetadataMutator {
    records: Records<ImageMetadata>,
}

impl ImageMetadataMutator {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            records: Records::new(store, collections::IMAGE_METADATA),
        }
    }

    /// Cached analysis for a content hash, newest first when duplicates exist.
    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<ImageMetadata>, ServiceError> {
        self.records
            .first(Filter::eq("file_hash", hash), Some("-created"))
            .await
    }

    /// Creates the cache entry for a hash, or overwrites the existing one and
    /// increments its version. Last write wins; there is no conflict
    /// detection.
    #[instrument(skip(self, metadata))]
    pub async fn save_metadata(
        &self,
        hash: &str,
        metadata: &AnalysisResult,
        image_type: ImageType,
    ) -> Result<ImageMetadata, ServiceError> {
        let existing = self.find_by_hash(hash).await?;
        match existing {
            Some(entry) => {
                self.records
                    .update(
                        &entry.id,
                        json!({
                            "metadata": serde_json::to_value(metadata)?,
                            "image_type": image_type,
                            "version": entry.version + 1,
                        }),
                    )
                    .await
            }
            None => {
                self.records
                    .create(json!({
                        "file_hash": hash,
                        "metadata": serde_json::to_value(metadata)?,
                        "image_type": image_type,
                        "version": 1,
                    }))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemAnalysis, ItemImageAnalysis};
    use crate::store::MemoryStore;

    fn result(label: &str) -> AnalysisResult {
        AnalysisResult::Item(ItemImageAnalysis {
            image_label: String::new(),
            image_notes: String::new(),
            item: ItemAnalysis {
                item_label: label.to_string(),
                item_name: String::new(),
                item_notes: String::new(),
                category_functional: "Tools".to_string(),
                category_specific: "Power Tools".to_string(),
                item_type: "Drill".to_string(),
                item_manufacturer: String::new(),
                item_attributes: vec![],
            },
        })
    }

    #[tokio::test]
    async fn save_creates_entry_at_version_one() {
        let cache = ImageMetadataMutator::new(Arc::new(MemoryStore::new()));
        let entry = cache
            .save_metadata("hash-a", &result("Drill"), ImageType::Item)
            .await
            .unwrap();
        assert_eq!(entry.version, 1);
        assert_eq!(entry.file_hash, "hash-a");
    }

    #[tokio::test]
    async fn resave_overwrites_and_increments_version() {
        let cache = ImageMetadataMutator::new(Arc::new(MemoryStore::new()));
        cache
            .save_metadata("hash-a", &result("Drill"), ImageType::Item)
            .await
            .unwrap();
        let second = cache
            .save_metadata("hash-a", &result("Impact Drill"), ImageType::Item)
            .await
            .unwrap();
        assert_eq!(second.version, 2);

        let fetched = cache.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(fetched.version, 2);
        match fetched.metadata {
            AnalysisResult::Item(analysis) => {
                assert_eq!(analysis.item.item_label, "Impact Drill")
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = ImageMetadataMutator::new(Arc::new(MemoryStore::new()));
        assert!(cache.find_by_hash("absent").await.unwrap().is_none());
    }
}
