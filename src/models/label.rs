use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Which kind of entity a label points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LabelTarget {
    Item,
    Container,
}

/// Physical layout of a printed label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum LabelFormat {
    #[serde(rename = "shipping-4x6")]
    #[strum(serialize = "shipping-4x6")]
    Shipping4x6,
    #[serde(rename = "address-30x100")]
    #[strum(serialize = "address-30x100")]
    Address30x100,
    #[serde(rename = "qr-only")]
    #[strum(serialize = "qr-only")]
    QrOnly,
}

/// Record of a generated label.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Label {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub label_type: LabelTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    pub format: LabelFormat,
    #[serde(default)]
    pub data: serde_json::Value,
}
