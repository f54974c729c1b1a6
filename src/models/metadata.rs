use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::image::ImageType;
use crate::models::item::ItemAttribute;

/// Fields the analyzer extracts for a single item, whether it appears alone
/// in a photo or inside a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemAnalysis {
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
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemImageAnalysis {
    #[serde(default)]
    pub image_label: String,
    #[serde(default)]
    pub image_notes: String,
    pub item: ItemAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerAnalysis {
    pub container_label: String,
    #[serde(default)]
    pub container_notes: String,
    #[serde(default)]
    pub container_items: Vec<ItemAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerImageAnalysis {
    #[serde(default)]
    pub image_label: String,
    #[serde(default)]
    pub image_notes: String,
    pub container: ContainerAnalysis,
}

/// Structured result of an AI image analysis.
///
/// Tagged union over the two photo kinds the analyzer distinguishes: a single
/// item, or a container with nested items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum AnalysisResult {
    Item(ItemImageAnalysis),
    Container(ContainerImageAnalysis),
}

impl AnalysisResult {
    pub fn image_type(&self) -> ImageType {
        match self {
            AnalysisResult::Item(_) => ImageType::Item,
            AnalysisResult::Container(_) => ImageType::Container,
        }
    }
}

/// Cache entry for an AI analysis, keyed uniquely by content hash.
///
/// `version` starts at 1 and is incremented on every overwrite for the same
/// hash. Nothing reads it back; it exists for parity with the stored shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageMetadata {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub file_hash: String,
    pub metadata: AnalysisResult,
    pub image_type: ImageType,
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_analysis() -> ItemAnalysis {
        ItemAnalysis {
            item_label: "Cordless Drill".to_string(),
            item_name: String::new(),
            item_notes: "18V brushless".to_string(),
            category_functional: "Tools".to_string(),
            category_specific: "Power Tools".to_string(),
            item_type: "Drill".to_string(),
            item_manufacturer: "Makita".to_string(),
            item_attributes: vec![],
        }
    }

    #[test]
    fn analysis_result_uses_type_and_data_tags() {
        let result = AnalysisResult::Item(ItemImageAnalysis {
            image_label: "drill on bench".to_string(),
            image_notes: String::new(),
            item: item_analysis(),
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "item");
        assert_eq!(value["data"]["item"]["item_label"], "Cordless Drill");

        let back: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn container_result_carries_nested_items() {
        let result = AnalysisResult::Container(ContainerImageAnalysis {
            image_label: "parts bin".to_string(),
            image_notes: String::new(),
            container: ContainerAnalysis {
                container_label: "Bin A".to_string(),
                container_notes: String::new(),
                container_items: vec![item_analysis()],
            },
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "container");
        assert_eq!(
            value["data"]["container"]["container_items"][0]["item_type"],
            "Drill"
        );
        assert_eq!(result.image_type(), ImageType::Container);
    }
}
