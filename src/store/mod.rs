//! Client abstraction over the backing collection store.
//!
//! The store is an external collaborator: a hosted record service with
//! collection-based CRUD, a string filter language, and file storage. This
//! module exposes a typed client trait, the filter-expression builder, an HTTP
//! implementation, and an in-memory implementation used by tests and the
//! development profile.

pub mod filter;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ServiceError;
pub use filter::Filter;
pub use http::HttpStore;
pub use memory::MemoryStore;

/// Collection names as laid out in the store.
pub mod collections {
    pub const ITEMS: &str = "items";
    pub const CONTAINERS: &str = "containers";
    pub const IMAGES: &str = "images";
    pub const IMAGE_METADATA: &str = "image_metadata";
    pub const ITEM_RECORDS: &str = "item_records";
    pub const CONTAINER_RECORDS: &str = "container_records";
    pub const ITEM_IMAGES: &str = "item_images";
    pub const CONTAINER_IMAGES: &str = "container_images";
    pub const LABELS: &str = "labels";
}

/// Query parameters for a paginated list call.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: u64,
    pub per_page: u64,
    pub filter: Option<Filter>,
    pub sort: Option<String>,
    pub expand: Option<String>,
}

impl ListQuery {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page,
            per_page,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }
}

/// One page of raw records.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub items: Vec<Value>,
    pub total_items: u64,
    pub page: u64,
    pub per_page: u64,
}

/// A file to attach to a record on creation.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Record field the filename is stored under.
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Typed client for the remote collection store.
///
/// Records cross this boundary as raw JSON; callers deserialize into their
/// entity types and treat a mismatch as a hard error.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<RecordPage, ServiceError>;

    /// Fetches one record, `Ok(None)` when the id is absent.
    async fn get(
        &self,
        collection: &str,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Option<Value>, ServiceError>;

    async fn create(&self, collection: &str, fields: Value) -> Result<Value, ServiceError>;

    async fn create_with_file(
        &self,
        collection: &str,
        fields: Value,
        file: StoredFile,
    ) -> Result<Value, ServiceError>;

    /// Applies a partial update. Fails with `NotFound` for an absent id.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value, ServiceError>;

    /// Removes a record. Fails with `NotFound` for an absent id.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError>;

    async fn download_file(
        &self,
        collection: &str,
        record_id: &str,
        filename: &str,
    ) -> Result<Vec<u8>, ServiceError>;

    /// Builds the public retrieval URL for a stored file.
    fn file_url(&self, collection: &str, record_id: &str, filename: &str) -> String;
}

/// Deserializes a raw record into an entity type, mapping a shape mismatch to
/// a serialization error rather than letting malformed store data through.
pub fn decode<T: serde::de::DeserializeOwned>(record: Value) -> Result<T, ServiceError> {
    serde_json::from_value(record).map_err(|e| {
        ServiceError::SerializationError(format!("store record did not match expected shape: {e}"))
    })
}
