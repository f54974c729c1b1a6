pub mod ingestion;
pub mod labels;
pub mod media;
pub mod vision;

pub use ingestion::{CategoryAxis, IngestionService, ProcessImageResult};
pub use labels::{GeneratedLabel, LabelService};
pub use vision::{OpenAiVision, VisionAnalyzer};
