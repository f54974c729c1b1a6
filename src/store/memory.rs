use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde_json::{json, Value};

use crate::errors::ServiceError;
use crate::store::{CollectionStore, ListQuery, RecordPage, StoredFile};

/// Relation fields the in-memory store can resolve for `expand`.
const RELATIONS: &[(&str, &str, &str)] = &[
    ("items", "primary_image", "images"),
    ("items", "container", "containers"),
    ("containers", "primary_image", "images"),
];

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 15;

/// In-memory collection store.
///
/// Backs the test suite and the development profile. Mirrors the hosted
/// store's observable behavior: insertion-ordered records by default,
/// server-assigned ids and timestamps, filter/sort/expand on list, and
/// NotFound on updates or deletes of absent ids.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Vec<Value>>,
    files: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id() -> String {
        let mut rng = rand::thread_rng();
        (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    fn stamp_new(fields: &mut Value) -> String {
        let id = Self::generate_id();
        let now = chrono::Utc::now().to_rfc3339();
        let object = fields.as_object_mut().expect("record fields must be an object");
        object.insert("id".to_string(), json!(id.clone()));
        object.insert("created".to_string(), json!(now.clone()));
        object.insert("updated".to_string(), json!(now));
        id
    }

    fn resolve_expand(&self, collection: &str, record: &mut Value, expand: &str) {
        let mut resolved = serde_json::Map::new();
        for field in expand.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let Some((_, _, target)) = RELATIONS
                .iter()
                .find(|(c, f, _)| *c == collection && *f == field)
            else {
                continue;
            };
            let Some(ref_id) = record.get(field).and_then(Value::as_str) else {
                continue;
            };
            if let Some(target_records) = self.records.get(*target) {
                if let Some(found) = target_records
                    .iter()
                    .find(|r| r.get("id").and_then(Value::as_str) == Some(ref_id))
                {
                    resolved.insert(field.to_string(), found.clone());
                }
            }
        }
        if !resolved.is_empty() {
            record
                .as_object_mut()
                .expect("record must be an object")
                .insert("expand".to_string(), Value::Object(resolved));
        }
    }

    fn sort_records(records: &mut [Value], sort: &str) {
        for key in sort.split(',').rev() {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let (descending, field) = match key.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, key),
            };
            records.sort_by(|a, b| {
                let left = field_sort_key(a, field);
                let right = field_sort_key(b, field);
                if descending {
                    right.partial_cmp(&left).unwrap_or(std::cmp::Ordering::Equal)
                } else {
                    left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
                }
            });
        }
    }
}

fn field_sort_key(record: &Value, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format!("{:032}", n.as_i64().unwrap_or(0)),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<RecordPage, ServiceError> {
        let all = self
            .records
            .get(collection)
            .map(|r| r.clone())
            .unwrap_or_default();

        let mut matching: Vec<Value> = match &query.filter {
            Some(filter) => all.into_iter().filter(|r| filter.matches(r)).collect(),
            None => all,
        };
        if let Some(sort) = &query.sort {
            Self::sort_records(&mut matching, sort);
        }

        let total_items = matching.len() as u64;
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        let offset = ((page - 1) * per_page) as usize;
        let mut items: Vec<Value> = matching
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();

        if let Some(expand) = &query.expand {
            for record in &mut items {
                self.resolve_expand(collection, record, expand);
            }
        }

        Ok(RecordPage {
            items,
            total_items,
            page,
            per_page,
        })
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Option<Value>, ServiceError> {
        let found = self.records.get(collection).and_then(|records| {
            records
                .iter()
                .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
                .cloned()
        });
        let Some(mut record) = found else {
            return Ok(None);
        };
        if let Some(expand) = expand {
            self.resolve_expand(collection, &mut record, expand);
        }
        Ok(Some(record))
    }

    async fn create(&self, collection: &str, mut fields: Value) -> Result<Value, ServiceError> {
        if !fields.is_object() {
            return Err(ServiceError::StoreError(
                "record fields must be a JSON object".to_string(),
            ));
        }
        Self::stamp_new(&mut fields);
        self.records
            .entry(collection.to_string())
            .or_default()
            .push(fields.clone());
        Ok(fields)
    }

    async fn create_with_file(
        &self,
        collection: &str,
        mut fields: Value,
        file: StoredFile,
    ) -> Result<Value, ServiceError> {
        if !fields.is_object() {
            return Err(ServiceError::StoreError(
                "record fields must be a JSON object".to_string(),
            ));
        }
        fields
            .as_object_mut()
            .expect("checked above")
            .insert(file.field.clone(), json!(file.filename.clone()));
        let id = Self::stamp_new(&mut fields);
        self.files.insert(
            format!("{}/{}/{}", collection, id, file.filename),
            file.bytes,
        );
        self.records
            .entry(collection.to_string())
            .or_default()
            .push(fields.clone());
        Ok(fields)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value, ServiceError> {
        let mut records = self
            .records
            .entry(collection.to_string())
            .or_default();
        let record = records
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| ServiceError::NotFound(format!("{collection} record {id}")))?;

        let object = record.as_object_mut().expect("stored records are objects");
        if let Value::Object(changes) = patch {
            for (key, value) in changes {
                object.insert(key, value);
            }
        }
        object.insert(
            "updated".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError> {
        let mut records = self
            .records
            .entry(collection.to_string())
            .or_default();
        let before = records.len();
        records.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        if records.len() == before {
            return Err(ServiceError::NotFound(format!("{collection} record {id}")));
        }
        Ok(())
    }

    async fn download_file(
        &self,
        collection: &str,
        record_id: &str,
        filename: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        self.files
            .get(&format!("{}/{}/{}", collection, record_id, filename))
            .map(|bytes| bytes.clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("file {collection}/{record_id}/{filename}"))
            })
    }

    fn file_url(&self, collection: &str, record_id: &str, filename: &str) -> String {
        format!("memory://{}/{}/{}", collection, record_id, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let record = store
            .create("items", json!({"item_label": "Hammer"}))
            .await
            .unwrap();
        let id = record["id"].as_str().unwrap();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(record["created"].is_string());
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let store = MemoryStore::new();
        for label in ["b", "a", "c"] {
            store
                .create("items", json!({"item_label": label, "category_functional": "Tools"}))
                .await
                .unwrap();
        }
        store
            .create("items", json!({"item_label": "d", "category_functional": "Office"}))
            .await
            .unwrap();

        let page = store
            .list(
                "items",
                &ListQuery::new(1, 2)
                    .with_filter(Filter::eq("category_functional", "Tools"))
                    .with_sort("item_label"),
            )
            .await
            .unwrap();
        assert_eq!(page.total_items, 3);
        let labels: Vec<&str> = page
            .items
            .iter()
            .map(|r| r["item_label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("items", "nope000000000000", json!({"item_label": "x"}))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn expand_resolves_relation_records() {
        let store = MemoryStore::new();
        let image = store
            .create(
                "images",
                json!({
                    "file": "photo.jpg",
                    "image_type": "unprocessed",
                    "analysis_status": "pending",
                    "user_ref": "usr0000000000001",
                }),
            )
            .await
            .unwrap();
        let item = store
            .create(
                "items",
                json!({"item_label": "Hammer", "primary_image": image["id"]}),
            )
            .await
            .unwrap();

        let fetched = store
            .get("items", item["id"].as_str().unwrap(), Some("primary_image"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched["expand"]["primary_image"]["file"], "photo.jpg");
    }

    #[tokio::test]
    async fn stored_files_round_trip() {
        let store = MemoryStore::new();
        let record = store
            .create_with_file(
                "images",
                json!({"image_type": "unprocessed"}),
                StoredFile {
                    field: "file".to_string(),
                    filename: "photo.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    bytes: vec![1, 2, 3],
                },
            )
            .await
            .unwrap();
        let bytes = store
            .download_file("images", record["id"].as_str().unwrap(), "photo.jpg")
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
