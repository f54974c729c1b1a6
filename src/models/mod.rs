pub mod audit;
pub mod bounding_box;
pub mod container;
pub mod image;
pub mod item;
pub mod label;
pub mod metadata;
pub mod slug;

pub use audit::{
    ContainerAuditRecord, ContainerImageMapping, ItemAuditRecord, ItemImageMapping,
    TransactionType,
};
pub use bounding_box::BoundingBox;
pub use container::{Container, ContainerInput, ContainerPatch};
pub use image::{AnalysisStatus, Image, ImagePatch, ImageType};
pub use item::{Item, ItemAttribute, ItemInput, ItemPatch};
pub use label::{Label, LabelFormat, LabelTarget};
pub use metadata::{
    AnalysisResult, ContainerAnalysis, ContainerImageAnalysis, ImageMetadata, ItemAnalysis,
    ItemImageAnalysis,
};
pub use slug::slugify;
