//! The image ingestion workflow: upload, content hash, cache lookup, AI
//! analysis on miss, and update-or-create of the cataloged entities.
//!
//! Per-image state machine: pending -> processing -> completed | failed, with
//! user-triggered retry re-entering processing from pending or failed. Two
//! byte-identical uploads must trigger at most one paid AI call; the content
//! hash of the original bytes is the sole cache key.

use std::sync::Arc;

use serde::Serialize;
use strum::EnumString;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{
    AnalysisResult, AnalysisStatus, Container, ContainerInput, ContainerPatch, Image, ImagePatch,
    ImageType, Item, ItemAnalysis, ItemInput,
};
use crate::mutators::{
    CategoryLibrary, ContainerMutator, ImageMetadataMutator, ImageMutator, ItemMutator,
};
use crate::services::media;
use crate::services::vision::VisionAnalyzer;
use crate::store::CollectionStore;

/// How many values per axis the AI prompt carries.
const CATEGORY_CONTEXT_CAP: usize = 10;

/// Seed lists substituted when an axis has no values yet, so the analyzer
/// always receives naming context.
const SEED_FUNCTIONAL: &[&str] = &[
    "Tools", "Electronics", "Materials", "Technology", "Office", "Furniture", "Kitchen",
    "Outdoor", "Automotive", "Hardware",
];
const SEED_SPECIFIC: &[&str] = &[
    "Power Tools", "Hand Tools", "Computer Components", "Fasteners", "Sensors", "Lab Equipment",
    "Stationery", "Kitchenware", "Gardening", "Safety Gear",
];
const SEED_ITEM_TYPE: &[&str] = &[
    "Drill", "Screwdriver", "CPU Heatsink", "Screws", "Proximity Sensor", "Oscilloscope", "Pen",
    "Plate", "Shovel", "Safety Glasses",
];

/// One category axis, as addressed by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CategoryAxis {
    Functional,
    Specific,
    ItemType,
}

/// Outcome of one ingestion run.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessImageResult {
    pub image: Image,
    pub result: AnalysisResult,
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
}

pub struct IngestionService {
    images: ImageMutator,
    metadata: ImageMetadataMutator,
    items: ItemMutator,
    containers: ContainerMutator,
    analyzer: Arc<dyn VisionAnalyzer>,
    jpeg_quality: u8,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        analyzer: Arc<dyn VisionAnalyzer>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            images: ImageMutator::new(store.clone()),
            metadata: ImageMetadataMutator::new(store.clone()),
            items: ItemMutator::new(store.clone()),
            containers: ContainerMutator::new(store),
            analyzer,
            jpeg_quality,
        }
    }

    /// Full workflow for a fresh upload: hash the original bytes, check the
    /// analysis cache, normalize to JPEG, create the image record (a new
    /// record on every upload), then analyze and upsert.
    #[instrument(skip(self, bytes), fields(filename))]
    pub async fn process_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        user_ref: &str,
    ) -> Result<ProcessImageResult, ServiceError> {
        let file_hash = media::content_hash(&bytes);
        let cached = self.metadata.find_by_hash(&file_hash).await?;

        let jpeg = media::normalize_to_jpeg(&bytes, self.jpeg_quality)?;
        let image = self
            .images
            .upload(
                &media::jpeg_filename(filename),
                "image/jpeg",
                jpeg.clone(),
                &file_hash,
                user_ref,
            )
            .await?;

        self.analyze_and_catalog(image, &file_hash, cached.map(|c| c.metadata), &jpeg, user_ref)
            .await
    }

    /// Re-runs the workflow for an already stored image (the user-triggered
    /// retry path). Downloads the stored file, reconciles the recorded hash
    /// when it drifted, then continues from the cache lookup.
    #[instrument(skip(self))]
    pub async fn process_existing(
        &self,
        image_id: &str,
        user_ref: &str,
    ) -> Result<ProcessImageResult, ServiceError> {
        let mut image = self
            .images
            .get_by_id(image_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Image with ID {image_id} not found")))?;

        let bytes = self.images.download(&image).await?;
        let file_hash = media::content_hash(&bytes);
        if image.file_hash.as_deref() != Some(file_hash.as_str()) {
            warn!(image_id, "stored file hash drifted; reconciling");
            image = self
                .images
                .update(
                    image_id,
                    ImagePatch {
                        file_hash: Some(file_hash.clone()),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let cached = self.metadata.find_by_hash(&file_hash).await?;
        self.analyze_and_catalog(image, &file_hash, cached.map(|c| c.metadata), &bytes, user_ref)
            .await
    }

    /// Distinct categories truncated for prompt context, with seed lists
    /// substituted for empty axes.
    pub async fn category_library(&self) -> Result<CategoryLibrary, ServiceError> {
        let all = self.items.get_distinct_categories().await?;
        let pick = |values: Vec<String>, seed: &[&str]| {
            if values.is_empty() {
                seed.iter().map(|s| s.to_string()).collect()
            } else {
                values.into_iter().take(CATEGORY_CONTEXT_CAP).collect()
            }
        };
        Ok(CategoryLibrary {
            functional: pick(all.functional, SEED_FUNCTIONAL),
            specific: pick(all.specific, SEED_SPECIFIC),
            item_type: pick(all.item_type, SEED_ITEM_TYPE),
        })
    }

    /// Case-insensitive substring filter over one axis of the distinct
    /// category values, capped at 10 results.
    pub async fn search_categories(
        &self,
        query: &str,
        axis: CategoryAxis,
    ) -> Result<Vec<String>, ServiceError> {
        let all = self.items.get_distinct_categories().await?;
        let values = match axis {
            CategoryAxis::Functional => all.functional,
            CategoryAxis::Specific => all.specific,
            CategoryAxis::ItemType => all.item_type,
        };
        let needle = query.to_lowercase();
        Ok(values
            .into_iter()
            .filter(|v| v.to_lowercase().contains(&needle))
            .take(CATEGORY_CONTEXT_CAP)
            .collect())
    }

    /// Steps 4-6: resolve the analysis (cache or AI), upsert the cataloged
    /// entities, and flip the image status. Any failure flips the status to
    /// `failed` (best effort) before propagating.
    async fn analyze_and_catalog(
        &self,
        image: Image,
        file_hash: &str,
        cached: Option<AnalysisResult>,
        jpeg: &[u8],
        user_ref: &str,
    ) -> Result<ProcessImageResult, ServiceError> {
        let image_id = image.id.clone();
        match self
            .run_analysis(image, file_hash, cached, jpeg, user_ref)
            .await
        {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(image_id, "image ingestion failed: {err}");
                if let Err(status_err) = self
                    .images
                    .update_analysis_status(&image_id, AnalysisStatus::Failed)
                    .await
                {
                    // Swallowed: the original failure is the one worth surfacing.
                    error!(image_id, "failed to mark image as failed: {status_err}");
                }
                Err(err)
            }
        }
    }

    async fn run_analysis(
        &self,
        image: Image,
        file_hash: &str,
        cached: Option<AnalysisResult>,
        jpeg: &[u8],
        user_ref: &str,
    ) -> Result<ProcessImageResult, ServiceError> {
        let result = match cached {
            Some(result) => {
                info!(hash = &file_hash[..8.min(file_hash.len())], "analysis cache hit");
                result
            }
            None => {
                info!(
                    hash = &file_hash[..8.min(file_hash.len())],
                    "analysis cache miss, calling AI API"
                );
                self.images
                    .update_analysis_status(&image.id, AnalysisStatus::Processing)
                    .await?;
                let categories = self.category_library().await?;
                let result = self.analyzer.analyze_image(jpeg, &categories).await?;
                self.metadata
                    .save_metadata(file_hash, &result, result.image_type())
                    .await?;
                result
            }
        };

        match &result {
            AnalysisResult::Item(analysis) => {
                let input = item_input(&analysis.item, None, &image.id, user_ref);
                let item = match self.items.find_by_primary_image(&image.id).await? {
                    Some(existing) => {
                        info!(image_id = %image.id, "item already exists for image, updating");
                        self.items.update(&existing.id, input.into()).await?
                    }
                    None => self.items.create(input).await?,
                };

                let image = self.complete_image(&image.id, ImageType::Item).await?;
                Ok(ProcessImageResult {
                    image,
                    result,
                    items: vec![item],
                    container: None,
                })
            }
            AnalysisResult::Container(analysis) => {
                let container = match self.containers.find_by_primary_image(&image.id).await? {
                    Some(existing) => {
                        info!(image_id = %image.id, "container already exists for image, updating");
                        self.containers
                            .update(
                                &existing.id,
                                ContainerPatch {
                                    container_label: Some(
                                        analysis.container.container_label.clone(),
                                    ),
                                    container_notes: Some(
                                        analysis.container.container_notes.clone(),
                                    ),
                                    primary_image: Some(image.id.clone()),
                                    ..Default::default()
                                },
                            )
                            .await?
                    }
                    None => {
                        self.containers
                            .create(ContainerInput {
                                container_label: analysis.container.container_label.clone(),
                                container_notes: analysis.container.container_notes.clone(),
                                primary_image: Some(image.id.clone()),
                                primary_image_bbox: None,
                                user_ref: user_ref.to_string(),
                            })
                            .await?
                    }
                };

                // No transaction boundary: a failure mid-loop leaves the
                // container with a subset of its items and no rollback.
                let mut items = Vec::with_capacity(analysis.container.container_items.len());
                for nested in &analysis.container.container_items {
                    let input = item_input(nested, Some(&container.id), &image.id, user_ref);
                    let item = match self
                        .items
                        .find_in_container_by_label(&container.id, &nested.item_label)
                        .await?
                    {
                        Some(existing) => {
                            info!(
                                container_id = %container.id,
                                label = %nested.item_label,
                                "item already exists in container, updating"
                            );
                            self.items.update(&existing.id, input.into()).await?
                        }
                        None => self.items.create(input).await?,
                    };
                    items.push(item);
                }

                let image = self.complete_image(&image.id, ImageType::Container).await?;
                Ok(ProcessImageResult {
                    image,
                    result,
                    items,
                    container: Some(container),
                })
            }
        }
    }

    async fn complete_image(
        &self,
        image_id: &str,
        image_type: ImageType,
    ) -> Result<Image, ServiceError> {
        self.images
            .update(
                image_id,
                ImagePatch {
                    image_type: Some(image_type),
                    analysis_status: Some(AnalysisStatus::Completed),
                    ..Default::default()
                },
            )
            .await
    }
}

fn item_input(
    analysis: &ItemAnalysis,
    container_id: Option<&str>,
    image_id: &str,
    user_ref: &str,
) -> ItemInput {
    ItemInput {
        item_label: analysis.item_label.clone(),
        item_name: analysis.item_name.clone(),
        item_notes: analysis.item_notes.clone(),
        category_functional: analysis.category_functional.clone(),
        category_specific: analysis.category_specific.clone(),
        item_type: analysis.item_type.clone(),
        item_manufacturer: analysis.item_manufacturer.clone(),
        item_attributes: analysis.item_attributes.clone(),
        container: container_id.map(str::to_string),
        primary_image: Some(image_id.to_string()),
        primary_image_bbox: None,
        user_ref: user_ref.to_string(),
    }
}
