//! Client for the external multimodal analysis API.
//!
//! One seam: [`VisionAnalyzer`]. The production implementation calls an
//! OpenAI-style chat-completions endpoint twice per analysis (a cheap type
//! triage, then the typed extraction against one of two JSON schemas); tests
//! substitute their own implementations.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::{AnalysisResult, ContainerImageAnalysis, ImageType, ItemImageAnalysis};
use crate::mutators::CategoryLibrary;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Extracts a structured analysis from a normalized JPEG. The category
    /// library is passed along for naming consistency.
    async fn analyze_image(
        &self,
        jpeg: &[u8],
        categories: &CategoryLibrary,
    ) -> Result<AnalysisResult, ServiceError>;
}

pub struct OpenAiVision {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiVision {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client init failed: {e}")))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            base_url,
            api_key,
            model: model.into(),
        })
    }

    fn data_url(jpeg: &[u8]) -> String {
        format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        )
    }

    /// One structured-output completion call; returns the raw JSON content of
    /// the first choice.
    async fn complete(
        &self,
        prompt: &str,
        image_data_url: &str,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, ServiceError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("AI API key is not configured".to_string())
        })?;

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_data_url } },
                ],
            }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema,
                },
            },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("AI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "AI API responded {status}: {body}"
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("AI response was not valid JSON: {e}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("AI response contained no choices".to_string())
            })?;
        serde_json::from_str(&content).map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "AI structured output did not parse as JSON: {e}"
            ))
        })
    }

    async fn determine_image_type(&self, image_data_url: &str) -> Result<ImageType, ServiceError> {
        let schema = json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["item", "container"],
                    "description": "Whether the image shows a single item or a container with multiple items",
                },
            },
            "required": ["type"],
            "additionalProperties": false,
        });
        let content = self
            .complete(
                "Determine if this image shows a single inventory item or a container/box with multiple items inside.",
                image_data_url,
                "image_kind",
                schema,
            )
            .await?;
        match content.get("type").and_then(Value::as_str) {
            Some("item") => Ok(ImageType::Item),
            Some("container") => Ok(ImageType::Container),
            other => Err(ServiceError::ExternalServiceError(format!(
                "AI returned an unknown image kind: {other:?}"
            ))),
        }
    }

    fn category_context(categories: &CategoryLibrary) -> String {
        let join = |values: &[String]| {
            if values.is_empty() {
                "None yet".to_string()
            } else {
                values.join(", ")
            }
        };
        format!(
            "Existing categories for consistency:\n\
             - Functional: {}\n\
             - Specific: {}\n\
             - Item Types: {}\n\
             \n\
             Use existing categories when appropriate, or create new ones if needed.",
            join(&categories.functional),
            join(&categories.specific),
            join(&categories.item_type),
        )
    }
}

fn attribute_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Attribute name (e.g., Input Voltage, Quantity)" },
            "value": { "type": "string", "description": "Attribute value (e.g., 12.0 Volts, 100 Count)" },
        },
        "required": ["name", "value"],
        "additionalProperties": false,
    })
}

fn item_fields_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "item_label": { "type": "string", "description": "Label of the item" },
            "item_name": { "type": "string", "description": "Common product name of the item" },
            "item_notes": { "type": "string", "description": "Additional notes about the item" },
            "category_functional": { "type": "string", "description": "Functional category (e.g., Tools, Electronics, Materials)" },
            "category_specific": { "type": "string", "description": "Specific category (e.g., Power Tools, Fasteners, Sensors)" },
            "item_type": { "type": "string", "description": "Type of object (e.g., Drill, Screws, CPU Heatsink)" },
            "item_manufacturer": { "type": "string", "description": "Specific brand or manufacturer of the item" },
            "item_attributes": { "type": "array", "items": attribute_schema() },
        },
        "required": [
            "item_label", "item_name", "item_notes", "category_functional",
            "category_specific", "item_type", "item_manufacturer", "item_attributes",
        ],
        "additionalProperties": false,
    })
}

fn item_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image_label": { "type": "string", "description": "Descriptive label for the image" },
            "image_notes": { "type": "string", "description": "Notes about the image content or context" },
            "item": item_fields_schema(),
        },
        "required": ["image_label", "image_notes", "item"],
        "additionalProperties": false,
    })
}

fn container_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image_label": { "type": "string", "description": "Descriptive label for the container image" },
            "image_notes": { "type": "string", "description": "Notes about the container image content or context" },
            "container": {
                "type": "object",
                "properties": {
                    "container_label": { "type": "string", "description": "Label of the container" },
                    "container_notes": { "type": "string", "description": "Notes about the container" },
                    "container_items": {
                        "type": "array",
                        "description": "Items contained within this container",
                        "items": item_fields_schema(),
                    },
                },
                "required": ["container_label", "container_notes", "container_items"],
                "additionalProperties": false,
            },
        },
        "required": ["image_label", "image_notes", "container"],
        "additionalProperties": false,
    })
}

#[async_trait]
impl VisionAnalyzer for OpenAiVision {
    #[instrument(skip(self, jpeg, categories))]
    async fn analyze_image(
        &self,
        jpeg: &[u8],
        categories: &CategoryLibrary,
    ) -> Result<AnalysisResult, ServiceError> {
        let image_data_url = Self::data_url(jpeg);
        let kind = self.determine_image_type(&image_data_url).await?;
        debug!(?kind, "image kind determined");
        let context = Self::category_context(categories);

        match kind {
            ImageType::Item | ImageType::Unprocessed => {
                let prompt = format!(
                    "Analyze this image of an inventory item. Extract detailed metadata including \
                     label, notes, categories, manufacturer, and attributes.\n\n{context}\n\n\
                     Be thorough and specific in your analysis. Include relevant attributes like \
                     dimensions, specifications, quantities, colors, or other distinguishing features."
                );
                let content = self
                    .complete(&prompt, &image_data_url, "item_analysis", item_image_schema())
                    .await?;
                let analysis: ItemImageAnalysis = serde_json::from_value(content).map_err(|e| {
                    ServiceError::ExternalServiceError(format!(
                        "AI item analysis did not match the expected schema: {e}"
                    ))
                })?;
                Ok(AnalysisResult::Item(analysis))
            }
            ImageType::Container => {
                let prompt = format!(
                    "Analyze this image of a container with multiple items. Extract metadata for \
                     the container and each visible item inside.\n\n{context}\n\n\
                     For each item in the container, provide detailed metadata including label, \
                     categories, manufacturer, and attributes. Be thorough and specific."
                );
                let content = self
                    .complete(
                        &prompt,
                        &image_data_url,
                        "container_analysis",
                        container_image_schema(),
                    )
                    .await?;
                let analysis: ContainerImageAnalysis =
                    serde_json::from_value(content).map_err(|e| {
                        ServiceError::ExternalServiceError(format!(
                            "AI container analysis did not match the expected schema: {e}"
                        ))
                    })?;
                Ok(AnalysisResult::Container(analysis))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: Value) -> Value {
        json!({
            "choices": [{ "message": { "content": content.to_string() } }],
        })
    }

    fn empty_categories() -> CategoryLibrary {
        CategoryLibrary {
            functional: vec![],
            specific: vec![],
            item_type: vec![],
        }
    }

    #[tokio::test]
    async fn analyze_runs_triage_then_typed_extraction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("image_kind"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(json!({"type": "item"}))),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("item_analysis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "image_label": "drill on bench",
                "image_notes": "",
                "item": {
                    "item_label": "Cordless Drill",
                    "item_name": "",
                    "item_notes": "",
                    "category_functional": "Tools",
                    "category_specific": "Power Tools",
                    "item_type": "Drill",
                    "item_manufacturer": "Makita",
                    "item_attributes": [],
                },
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let vision = OpenAiVision::new(
            server.uri(),
            Some("key".to_string()),
            "test-model",
            Duration::from_secs(5),
        )
        .unwrap();

        let result = vision
            .analyze_image(&[0xFF, 0xD8], &empty_categories())
            .await
            .unwrap();
        match result {
            AnalysisResult::Item(analysis) => {
                assert_eq!(analysis.item.item_label, "Cordless Drill")
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let vision = OpenAiVision::new(
            server.uri(),
            Some("key".to_string()),
            "test-model",
            Duration::from_secs(5),
        )
        .unwrap();
        let err = vision
            .analyze_image(&[0xFF, 0xD8], &empty_categories())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let vision = OpenAiVision::new(
            "http://localhost:1",
            None,
            "test-model",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = vision
            .analyze_image(&[0xFF, 0xD8], &empty_categories())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[test]
    fn category_context_lists_existing_values() {
        let categories = CategoryLibrary {
            functional: vec!["Tools".to_string()],
            specific: vec![],
            item_type: vec!["Drill".to_string(), "Saw".to_string()],
        };
        let context = OpenAiVision::category_context(&categories);
        assert!(context.contains("- Functional: Tools"));
        assert!(context.contains("- Specific: None yet"));
        assert!(context.contains("- Item Types: Drill, Saw"));
    }
}
