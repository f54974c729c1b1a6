//! Append-only audit trail and primary-image history writer.
//!
//! Audit entries and history mappings are never mutated after creation.
//! Field-level audit writes are best-effort (a failure is logged and
//! swallowed); the primary-image history write is not, because it must land
//! before the update it describes becomes visible.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::error;

use crate::errors::ServiceError;
use crate::models::{BoundingBox, TransactionType};
use crate::store::{collections, CollectionStore};

/// Record bookkeeping fields excluded from field-level audit comparison.
const AUDIT_FIELD_BLACKLIST: &[&str] = &["id", "created", "updated", "expand"];

pub struct AuditTrail {
    store: Arc<dyn CollectionStore>,
    audit_collection: &'static str,
    mapping_collection: &'static str,
    ref_field: &'static str,
}

impl AuditTrail {
    pub fn for_items(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            audit_collection: collections::ITEM_RECORDS,
            mapping_collection: collections::ITEM_IMAGES,
            ref_field: "item_ref",
        }
    }

    pub fn for_containers(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            audit_collection: collections::CONTAINER_RECORDS,
            mapping_collection: collections::CONTAINER_IMAGES,
            ref_field: "container_ref",
        }
    }

    /// Whole-record snapshot entry for a creation.
    pub async fn record_create(&self, entity_id: &str, user_ref: &str, snapshot: &Value) {
        self.write_entry(
            entity_id,
            user_ref,
            TransactionType::Create,
            None,
            snapshot.to_string(),
            None,
        )
        .await;
    }

    /// Whole-record snapshot entry for a deletion; the snapshot is the state
    /// that was removed.
    pub async fn record_delete(&self, entity_id: &str, user_ref: &str, snapshot: &Value) {
        self.write_entry(
            entity_id,
            user_ref,
            TransactionType::Delete,
            None,
            snapshot.to_string(),
            None,
        )
        .await;
    }

    /// One `update` entry per field whose stringified value changed.
    pub async fn record_field_changes(
        &self,
        entity_id: &str,
        user_ref: &str,
        previous: &Value,
        current: &Value,
    ) {
        let Some(fields) = current.as_object() else {
            return;
        };
        for field_name in fields.keys() {
            if AUDIT_FIELD_BLACKLIST.contains(&field_name.as_str()) {
                continue;
            }
            let new_value = stringify_field(current, field_name);
            let previous_value = stringify_field(previous, field_name);
            if new_value == previous_value {
                continue;
            }
            self.write_entry(
                entity_id,
                user_ref,
                TransactionType::Update,
                Some(field_name.as_str()),
                new_value,
                Some(previous_value),
            )
            .await;
        }
    }

    /// Appends a primary-image history mapping. Unlike audit entries this
    /// propagates failure: the mapping must exist before the update that
    /// replaces the image is applied.
    pub async fn append_image_mapping(
        &self,
        entity_id: &str,
        image_id: &str,
        bounding_box: Option<&BoundingBox>,
    ) -> Result<(), ServiceError> {
        let mut fields = json!({
            self.ref_field: entity_id,
            "image_ref": image_id,
        });
        if let Some(bbox) = bounding_box {
            fields
                .as_object_mut()
                .expect("literal object")
                .insert("bounding_box".to_string(), serde_json::to_value(bbox)?);
        }
        self.store
            .create(self.mapping_collection, fields)
            .await
            .map(|_| ())
    }

    async fn write_entry(
        &self,
        entity_id: &str,
        user_ref: &str,
        transaction_type: TransactionType,
        field_name: Option<&str>,
        new_value: String,
        previous_value: Option<String>,
    ) {
        let mut fields = json!({
            self.ref_field: entity_id,
            "user_ref": user_ref,
            "transaction_type": transaction_type.to_string(),
            "new_value": new_value,
        });
        let object = fields.as_object_mut().expect("literal object");
        if let Some(field_name) = field_name {
            object.insert("field_name".to_string(), json!(field_name));
        }
        if let Some(previous_value) = previous_value {
            object.insert("previous_value".to_string(), json!(previous_value));
        }

        if let Err(err) = self.store.create(self.audit_collection, fields).await {
            error!(
                entity_id,
                collection = self.audit_collection,
                "failed to write audit record: {err}"
            );
        }
    }
}

fn stringify_field(record: &Value, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, ListQuery, MemoryStore};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn field_changes_produce_one_entry_per_changed_field() {
        let store = store();
        let trail = AuditTrail::for_items(store.clone());
        let previous = json!({
            "id": "itm0000000000001",
            "item_label": "Drill",
            "item_notes": "old",
            "updated": "2025-01-01T00:00:00Z",
        });
        let current = json!({
            "id": "itm0000000000001",
            "item_label": "Drill",
            "item_notes": "new",
            "updated": "2025-01-02T00:00:00Z",
        });
        trail
            .record_field_changes("itm0000000000001", "usr0000000000001", &previous, &current)
            .await;

        let page = store
            .list(collections::ITEM_RECORDS, &ListQuery::new(1, 50))
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        let entry = &page.items[0];
        assert_eq!(entry["field_name"], "item_notes");
        assert_eq!(entry["new_value"], "new");
        assert_eq!(entry["previous_value"], "old");
        assert_eq!(entry["transaction_type"], "update");
    }

    #[tokio::test]
    async fn image_mapping_carries_bounding_box() {
        let store = store();
        let trail = AuditTrail::for_containers(store.clone());
        let bbox = BoundingBox {
            x: 0.1,
            y: 0.2,
            width: 0.3,
            height: 0.4,
        };
        trail
            .append_image_mapping("ctr0000000000001", "img0000000000001", Some(&bbox))
            .await
            .unwrap();

        let page = store
            .list(
                collections::CONTAINER_IMAGES,
                &ListQuery::new(1, 10)
                    .with_filter(Filter::eq("container_ref", "ctr0000000000001")),
            )
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0]["image_ref"], "img0000000000001");
        assert_eq!(page.items[0]["bounding_box"]["width"], 0.3);
    }
}
