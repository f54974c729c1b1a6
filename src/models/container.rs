use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::bounding_box::BoundingBox;
use crate::models::image::Image;

/// Stored container record. Items point back at it via `Item.container`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub container_label: String,
    #[serde(default)]
    pub container_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image_bbox: Option<BoundingBox>,
    pub user_ref: String,
    #[serde(default, skip_serializing_if = "ContainerExpand::is_empty")]
    pub expand: ContainerExpand,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ContainerExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<Image>,
}

impl ContainerExpand {
    pub fn is_empty(&self) -> bool {
        self.primary_image.is_none()
    }
}

/// Input for creating a container.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContainerInput {
    #[validate(length(min = 1, message = "container label is required"))]
    pub container_label: String,
    #[serde(default)]
    pub container_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate]
    pub primary_image_bbox: Option<BoundingBox>,
    pub user_ref: String,
}

impl ContainerInput {
    pub fn validate_and_normalize(self) -> Result<Self, ServiceError> {
        self.validate()?;
        Ok(self)
    }
}

/// Partial update for a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContainerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "container label is required"))]
    pub container_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate]
    pub primary_image_bbox: Option<BoundingBox>,
}

impl ContainerPatch {
    pub fn validate_and_normalize(self) -> Result<Self, ServiceError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trips_through_normalization_unchanged() {
        let input = ContainerInput {
            container_label: "Parts Bin A".to_string(),
            container_notes: "Top shelf".to_string(),
            primary_image: None,
            primary_image_bbox: None,
            user_ref: "usr0000000000001".to_string(),
        };
        let once = input.validate_and_normalize().unwrap();
        let twice = once.clone().validate_and_normalize().unwrap();
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn rejects_empty_label() {
        let input = ContainerInput {
            container_label: String::new(),
            container_notes: String::new(),
            primary_image: None,
            primary_image_bbox: None,
            user_ref: "usr0000000000001".to_string(),
        };
        assert_matches!(
            input.validate_and_normalize(),
            Err(ServiceError::ValidationError(_))
        );
    }
}
