use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::models::bounding_box::BoundingBox;

/// Kind of change an audit record describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionType {
    Create,
    Update,
    Delete,
}

/// Append-only audit entry for an item. `field_name` is unset for whole-record
/// entries (create/delete snapshots); update entries carry one record per
/// changed field with the new and previous values.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemAuditRecord {
    pub id: String,
    pub created: DateTime<Utc>,
    pub item_ref: String,
    pub user_ref: String,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    pub new_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

/// Append-only audit entry for a container. Same shape as [`ItemAuditRecord`]
/// against the container collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContainerAuditRecord {
    pub id: String,
    pub created: DateTime<Utc>,
    pub container_ref: String,
    pub user_ref: String,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    pub new_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

/// History row recording a (current or former) primary image of an item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemImageMapping {
    pub id: String,
    pub created: DateTime<Utc>,
    pub item_ref: String,
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// History row recording a (current or former) primary image of a container.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContainerImageMapping {
    pub id: String,
    pub created: DateTime<Utc>,
    pub container_ref: String,
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}
