//! CRUD mutators: one per entity type, wrapping the collection store with
//! validation, audit-record emission, and entity-specific queries.

pub mod audit;
pub mod container;
pub mod image;
pub mod image_metadata;
pub mod item;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::store::{CollectionStore, Filter, ListQuery, StoredFile};

pub use container::ContainerMutator;
pub use image::ImageMutator;
pub use image_metadata::ImageMetadataMutator;
pub use item::{CategoryLibrary, ItemMutator, ItemSearchFilters};

/// Search results are capped at one page of this size; no relevance ranking.
pub const SEARCH_PAGE_CAP: u64 = 500;

/// Typed access to one collection.
///
/// Every mutator embeds one of these per collection it touches; records cross
/// the store boundary as raw JSON and are decoded here, treating any shape
/// mismatch as a hard error.
pub struct Records<T> {
    store: Arc<dyn CollectionStore>,
    collection: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Records<T> {
    pub fn new(store: Arc<dyn CollectionStore>, collection: &'static str) -> Self {
        Self {
            store,
            collection,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub async fn page(&self, query: &ListQuery) -> Result<(Vec<T>, u64), ServiceError> {
        let page = self.store.list(self.collection, query).await?;
        let total = page.total_items;
        let items = page
            .items
            .into_iter()
            .map(crate::store::decode)
            .collect::<Result<Vec<T>, _>>()?;
        Ok((items, total))
    }

    /// First match for a filter, or `None`.
    pub async fn first(
        &self,
        filter: Filter,
        sort: Option<&str>,
    ) -> Result<Option<T>, ServiceError> {
        let mut query = ListQuery::new(1, 1).with_filter(filter);
        if let Some(sort) = sort {
            query = query.with_sort(sort);
        }
        let (mut items, _) = self.page(&query).await?;
        Ok(items.pop())
    }

    pub async fn get(&self, id: &str, expand: Option<&str>) -> Result<Option<T>, ServiceError> {
        match self.store.get(self.collection, id, expand).await? {
            Some(record) => Ok(Some(crate::store::decode(record)?)),
            None => Ok(None),
        }
    }

    /// Fetches a record or fails with `NotFound`.
    pub async fn require(&self, id: &str) -> Result<T, ServiceError> {
        self.get(id, None).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("{} record {} not found", self.collection, id))
        })
    }

    pub async fn create(&self, fields: Value) -> Result<T, ServiceError> {
        let record = self.store.create(self.collection, fields).await?;
        crate::store::decode(record)
    }

    pub async fn create_with_file(
        &self,
        fields: Value,
        file: StoredFile,
    ) -> Result<T, ServiceError> {
        let record = self
            .store
            .create_with_file(self.collection, fields, file)
            .await?;
        crate::store::decode(record)
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<T, ServiceError> {
        let record = self.store.update(self.collection, id, patch).await?;
        crate::store::decode(record)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete(self.collection, id).await
    }
}
