use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// What an image was classified as after analysis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageType {
    Item,
    Container,
    Unprocessed,
}

/// Per-image analysis state machine.
///
/// Transitions are forward-only (pending -> processing -> completed | failed)
/// except for a user-triggered retry, which re-enters processing from pending
/// or failed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Stored image record. The binary lives in the store's file storage; `file`
/// is its stored filename.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Image {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub file: String,
    /// SHA-256 (hex) of the ORIGINAL uploaded bytes, not the normalized copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub image_type: ImageType,
    pub analysis_status: AnalysisStatus,
    pub user_ref: String,
}

/// Partial update for an image record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ImagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_status: Option<AnalysisStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(ImageType::Unprocessed).unwrap(),
            "unprocessed"
        );
        assert_eq!(
            serde_json::to_value(AnalysisStatus::Processing).unwrap(),
            "processing"
        );
        assert_eq!(AnalysisStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ImagePatch {
            analysis_status: Some(AnalysisStatus::Completed),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 1);
    }
}
