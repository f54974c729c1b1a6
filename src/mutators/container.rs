use std::sync::Arc;

use tracing::{error, instrument};

use crate::errors::ServiceError;
use crate::models::{Container, ContainerAuditRecord, ContainerImageMapping, ContainerInput, ContainerPatch};
use crate::mutators::audit::AuditTrail;
use crate::mutators::{Records, SEARCH_PAGE_CAP};
use crate::store::{collections, CollectionStore, Filter, ListQuery};

pub struct ContainerMutator {
    records: Records<Container>,
    audit_records: Records<ContainerAuditRecord>,
    image_history: Records<ContainerImageMapping>,
    trail: AuditTrail,
}

impl ContainerMutator {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            records: Records::new(store.clone(), collections::CONTAINERS),
            audit_records: Records::new(store.clone(), collections::CONTAINER_RECORDS),
            image_history: Records::new(store.clone(), collections::CONTAINER_IMAGES),
            trail: AuditTrail::for_containers(store),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ContainerInput) -> Result<Container, ServiceError> {
        let input = input.validate_and_normalize()?;
        let container = self.records.create(serde_json::to_value(&input)?).await?;

        let snapshot = serde_json::to_value(&container)?;
        self.trail
            .record_create(&container.id, &container.user_ref, &snapshot)
            .await;
        if let Some(image_id) = &container.primary_image {
            if let Err(err) = self
                .trail
                .append_image_mapping(
                    &container.id,
                    image_id,
                    container.primary_image_bbox.as_ref(),
                )
                .await
            {
                error!(container_id = %container.id, "failed to record initial image mapping: {err}");
            }
        }
        Ok(container)
    }

    /// Applies a partial update, archiving the outgoing primary image first
    /// when the patch replaces it with a different one.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: ContainerPatch) -> Result<Container, ServiceError> {
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
    ) -> Result<Option<Container>, ServiceError> {
        self.records.get(id, expand).await
    }

    pub async fn require(&self, id: &str) -> Result<Container, ServiceError> {
        self.records.require(id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<(Vec<Container>, u64), ServiceError> {
        self.records.page(query).await
    }

    /// Substring search across label and notes. Capped at one page.
    pub async fn search(&self, query: &str) -> Result<Vec<Container>, ServiceError> {
        let trimmed = query.trim();
        let mut list_query = ListQuery::new(1, SEARCH_PAGE_CAP);
        if !trimmed.is_empty() {
            list_query = list_query.with_filter(Filter::any(vec![
                Filter::like("container_label", trimmed),
                Filter::like("container_notes", trimmed),
            ]));
        }
        let (containers, _) = self.records.page(&list_query).await?;
        Ok(containers)
    }

    pub async fn find_by_primary_image(
        &self,
        image_id: &str,
    ) -> Result<Option<Container>, ServiceError> {
        self.records
            .first(Filter::eq("primary_image", image_id), None)
            .await
    }

    /// Audit entries for a container, newest first.
    pub async fn history(
        &self,
        container_id: &str,
    ) -> Result<Vec<ContainerAuditRecord>, ServiceError> {
        let query = ListQuery::new(1, SEARCH_PAGE_CAP)
            .with_filter(Filter::eq("container_ref", container_id))
            .with_sort("-created");
        let (records, _) = self.audit_records.page(&query).await?;
        Ok(records)
    }

    /// Primary-image history mappings for a container, newest first.
    pub async fn image_history(
        &self,
        container_id: &str,
    ) -> Result<Vec<ContainerImageMapping>, ServiceError> {
        let query = ListQuery::new(1, SEARCH_PAGE_CAP)
            .with_filter(Filter::eq("container_ref", container_id))
            .with_sort("-created");
        let (records, _) = self.image_history.page(&query).await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn mutator() -> ContainerMutator {
        ContainerMutator::new(Arc::new(MemoryStore::new()))
    }

    fn input(label: &str) -> ContainerInput {
        ContainerInput {
            container_label: label.to_string(),
            container_notes: String::new(),
            primary_image: None,
            primary_image_bbox: None,
            user_ref: "usr0000000000001".to_string(),
        }
    }

    #[tokio::test]
    async fn search_matches_label_substring() {
        let containers = mutator();
        containers.create(input("Parts Bin A")).await.unwrap();
        containers.create(input("Toolbox")).await.unwrap();

        let hits = containers.search("bin").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].container_label, "Parts Bin A");
    }

    #[tokio::test]
    async fn primary_image_change_archives_previous() {
        let containers = mutator();
        let mut seed = input("Parts Bin A");
        seed.primary_image = Some("img0000000000001".to_string());
        let container = containers.create(seed).await.unwrap();

        containers
            .update(
                &container.id,
                ContainerPatch {
                    primary_image: Some("img0000000000002".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mappings = containers.image_history(&container.id).await.unwrap();
        assert_eq!(mappings.len(), 2);
        assert!(mappings.iter().any(|m| m.image_ref == "img0000000000001"));
    }
}
