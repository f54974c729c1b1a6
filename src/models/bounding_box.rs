use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Normalized rectangle locating a sub-region of an image.
///
/// All components are fractions of the image dimensions, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct BoundingBox {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub width: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub height: f64,
}
