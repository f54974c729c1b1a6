use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::bounding_box::BoundingBox;
use crate::models::image::Image;
use crate::models::slug::slugify;

/// Free-form name/value pair attached to an item (e.g. "Input Voltage" / "12 V").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemAttribute {
    pub name: String,
    pub value: String,
}

/// Stored item record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub item_label: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_notes: String,
    pub category_functional: String,
    pub category_specific: String,
    pub item_type: String,
    #[serde(default)]
    pub item_manufacturer: String,
    #[serde(default)]
    pub item_attributes: Vec<ItemAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image_bbox: Option<BoundingBox>,
    pub user_ref: String,
    #[serde(default, skip_serializing_if = "ItemExpand::is_empty")]
    pub expand: ItemExpand,
}

/// Relations resolved inline by the store when requested via `expand`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ItemExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<Image>,
}

impl ItemExpand {
    pub fn is_empty(&self) -> bool {
        self.primary_image.is_none()
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ItemInput {
    #[validate(length(min = 1, message = "item label is required"))]
    pub item_label: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_notes: String,
    #[validate(length(min = 1, message = "functional category is required"))]
    pub category_functional: String,
    #[validate(length(min = 1, message = "specific category is required"))]
    pub category_specific: String,
    #[validate(length(min = 1, message = "item type is required"))]
    pub item_type: String,
    #[serde(default)]
    pub item_manufacturer: String,
    #[serde(default)]
    pub item_attributes: Vec<ItemAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate]
    pub primary_image_bbox: Option<BoundingBox>,
    pub user_ref: String,
}

impl ItemInput {
    /// Validates the input and slugifies the category fields.
    ///
    /// Slugification can empty a value that consisted only of punctuation, so
    /// the non-empty constraint is re-checked afterwards.
    pub fn validate_and_normalize(mut self) -> Result<Self, ServiceError> {
        self.validate()?;
        self.category_functional = slugify(&self.category_functional);
        self.category_specific = slugify(&self.category_specific);
        self.item_type = slugify(&self.item_type);
        for (field, value) in [
            ("category_functional", &self.category_functional),
            ("category_specific", &self.category_specific),
            ("item_type", &self.item_type),
        ] {
            if value.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "{field} must contain at least one letter or digit"
                )));
            }
        }
        Ok(self)
    }
}

/// Partial update for an item. Absent fields are left untouched; the owner
/// reference is never updatable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "item label is required"))]
    pub item_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "functional category is required"))]
    pub category_functional: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "specific category is required"))]
    pub category_specific: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "item type is required"))]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_attributes: Option<Vec<ItemAttribute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate]
    pub primary_image_bbox: Option<BoundingBox>,
}

impl ItemPatch {
    pub fn validate_and_normalize(mut self) -> Result<Self, ServiceError> {
        self.validate()?;
        for slot in [
            &mut self.category_functional,
            &mut self.category_specific,
            &mut self.item_type,
        ] {
            if let Some(value) = slot {
                let normalized = slugify(value);
                if normalized.is_empty() {
                    return Err(ServiceError::ValidationError(
                        "category fields must contain at least one letter or digit".to_string(),
                    ));
                }
                *slot = Some(normalized);
            }
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| v.as_object().map(|o| o.is_empty()).unwrap_or(true))
            .unwrap_or(true)
    }
}

impl From<ItemInput> for ItemPatch {
    fn from(input: ItemInput) -> Self {
        ItemPatch {
            item_label: Some(input.item_label),
            item_name: Some(input.item_name),
            item_notes: Some(input.item_notes),
            category_functional: Some(input.category_functional),
            category_specific: Some(input.category_specific),
            item_type: Some(input.item_type),
            item_manufacturer: Some(input.item_manufacturer),
            item_attributes: Some(input.item_attributes),
            container: input.container,
            primary_image: input.primary_image,
            primary_image_bbox: input.primary_image_bbox,
        }
    }
}
