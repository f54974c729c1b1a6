use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{Item, ItemAuditRecord, ItemImageMapping, ItemInput, ItemPatch};
use crate::mutators::audit::AuditTrail;
use crate::mutators::{Records, SEARCH_PAGE_CAP};
use crate::store::{collections, CollectionStore, Filter, ListQuery};

/// Full-scan cap for the distinct-category projection. Acceptable only
/// because item counts are assumed small; there is no caching and no
/// incremental maintenance.
const DISTINCT_SCAN_CAP: u64 = 5000;

/// Exact-match filters applied alongside a search query.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ItemSearchFilters {
    pub category_functional: Option<String>,
    pub category_specific: Option<String>,
    pub item_type: Option<String>,
    pub container: Option<String>,
}

/// Distinct category values across all items, one sorted list per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryLibrary {
    pub functional: Vec<String>,
    pub specific: Vec<String>,
    pub item_type: Vec<String>,
}

pub struct ItemMutator {
    records: Records<Item>,
    audit_records: Records<ItemAuditRecord>,
    image_history: Records<ItemImageMapping>,
    trail: AuditTrail,
}

impl ItemMutator {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            records: Records::new(store.clone(), collections::ITEMS),
            audit_records: Records::new(store.clone(), collections::ITEM_RECORDS),
            image_history: Records::new(store.clone(), collections::ITEM_IMAGES),
            trail: AuditTrail::for_items(store),
        }
    }

    /// Validates, normalizes, and persists a new item. Emits a create audit
    /// snapshot and, when a primary image is set, the initial history mapping.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ItemInput) -> Result<Item, ServiceError> {
        let input = input.validate_and_normalize()?;
        let item = self.records.create(serde_json::to_value(&input)?).await?;

        let snapshot = serde_json::to_value(&item)?;
        self.trail
            .record_create(&item.id, &item.user_ref, &snapshot)
            .await;
        if let Some(image_id) = &item.primary_image {
            if let Err(err) = self
                .trail
                .append_image_mapping(&item.id, image_id, item.primary_image_bbox.as_ref())
                .await
            {
                error!(item_id = %item.id, "failed to record initial image mapping: {err}");
            }
        }
        Ok(item)
    }

    /// Applies a partial update.
    ///
    /// When the patch replaces a set primary image with a different one, the
    /// outgoing (image, bounding box) pair is archived into the history
    /// collection before the update lands. Field-level audit entries follow
    /// the update.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: ItemPatch) -> Result<Item, ServiceError> {
        let patch = patch.validate_and_normalize()?;
        let current = self.records.require(id).await?;

        if let (Some(new_image), Some(old_image)) = (&patch.primary_image, &current.primary_image) {
            if new_image != old_image {
                self.trail
                    .append_image_mapping(id, old_image, current.primary_image_bbox.as_ref())
                    .await?;
            }
        }

        let updated = self.records.update(id, serde_json::to_value(&patch)?).await?;
        self.trail
            .record_field_changes(
                id,
                &updated.user_ref,
                &serde_json::to_value(&current)?,
                &serde_json::to_value(&updated)?,
            )
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let current = self.records.require(id).await?;
        self.records.delete(id).await?;
        self.trail
            .record_delete(id, &current.user_ref, &serde_json::to_value(&current)?)
            .await;
        Ok(())
    }

    pub async fn get_by_id(
        &self,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Option<Item>, ServiceError> {
        self.records.get(id, expand).await
    }

    pub async fn require(&self, id: &str) -> Result<Item, ServiceError> {
        self.records.require(id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<(Vec<Item>, u64), ServiceError> {
        self.records.page(query).await
    }

    /// Substring search across the item's text fields, AND-ed with any exact
    /// filters. Capped at one page; ordering is the store default.
    pub async fn search(
        &self,
        query: &str,
        filters: &ItemSearchFilters,
    ) -> Result<Vec<Item>, ServiceError> {
        let mut clauses = Vec::new();

        let trimmed = query.trim();
        if !trimmed.is_empty() {
            clauses.push(Filter::any(vec![
                Filter::like("item_label", trimmed),
                Filter::like("item_name", trimmed),
                Filter::like("item_notes", trimmed),
                Filter::like("item_manufacturer", trimmed),
            ]));
        }
        for (field, value) in [
            ("category_functional", &filters.category_functional),
            ("category_specific", &filters.category_specific),
            ("item_type", &filters.item_type),
            ("container", &filters.container),
        ] {
            if let Some(value) = value {
                clauses.push(Filter::eq(field, value.clone()));
            }
        }

        let mut list_query = ListQuery::new(1, SEARCH_PAGE_CAP);
        if !clauses.is_empty() {
            list_query = list_query.with_filter(Filter::and(clauses));
        }
        let (items, _) = self.records.page(&list_query).await?;
        Ok(items)
    }

    pub async fn get_by_container(&self, container_id: &str) -> Result<Vec<Item>, ServiceError> {
        let query = ListQuery::new(1, SEARCH_PAGE_CAP)
            .with_filter(Filter::eq("container", container_id));
        let (items, _) = self.records.page(&query).await?;
        Ok(items)
    }

    /// Projects the distinct non-empty values of the three category axes,
    /// each alphabetically sorted. Full-table scan.
    pub async fn get_distinct_categories(&self) -> Result<CategoryLibrary, ServiceError> {
        let (items, _) = self.records.page(&ListQuery::new(1, DISTINCT_SCAN_CAP)).await?;

        let mut functional = BTreeSet::new();
        let mut specific = BTreeSet::new();
        let mut item_type = BTreeSet::new();
        for item in &items {
            if !item.category_functional.is_empty() {
                functional.insert(item.category_functional.clone());
            }
            if !item.category_specific.is_empty() {
                specific.insert(item.category_specific.clone());
            }
            if !item.item_type.is_empty() {
                item_type.insert(item.item_type.clone());
            }
        }

        Ok(CategoryLibrary {
            functional: functional.into_iter().collect(),
            specific: specific.into_iter().collect(),
            item_type: item_type.into_iter().collect(),
        })
    }

    /// Existence heuristic used by re-analysis: the item whose primary image
    /// is the given image, if any.
    pub async fn find_by_primary_image(
        &self,
        image_id: &str,
    ) -> Result<Option<Item>, ServiceError> {
        self.records
            .first(Filter::eq("primary_image", image_id), None)
            .await
    }

    /// Existence heuristic for nested container items: (container, label)
    /// equality. Not a strong idempotency key.
    pub async fn find_in_container_by_label(
        &self,
        container_id: &str,
        label: &str,
    ) -> Result<Option<Item>, ServiceError> {
        self.records
            .first(
                Filter::and(vec![
                    Filter::eq("container", container_id),
                    Filter::eq("item_label", label),
                ]),
                None,
            )
            .await
    }

    /// Audit entries for an item, newest first.
    pub async fn history(&self, item_id: &str) -> Result<Vec<ItemAuditRecord>, ServiceError> {
        let query = ListQuery::new(1, SEARCH_PAGE_CAP)
            .with_filter(Filter::eq("item_ref", item_id))
            .with_sort("-created");
        let (records, _) = self.audit_records.page(&query).await?;
        Ok(records)
    }

    /// Primary-image history mappings for an item, newest first.
    pub async fn image_history(
        &self,
        item_id: &str,
    ) -> Result<Vec<ItemImageMapping>, ServiceError> {
        let query = ListQuery::new(1, SEARCH_PAGE_CAP)
            .with_filter(Filter::eq("item_ref", item_id))
            .with_sort("-created");
        let (records, _) = self.image_history.page(&query).await?;
        Ok(records)
    }
}
