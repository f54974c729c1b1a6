#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use stockroom_api::config::AppConfig;
use stockroom_api::errors::ServiceError;
use stockroom_api::handlers::AppServices;
use stockroom_api::models::{
    AnalysisResult, ContainerAnalysis, ContainerImageAnalysis, ItemAnalysis, ItemImageAnalysis,
};
use stockroom_api::mutators::CategoryLibrary;
use stockroom_api::services::VisionAnalyzer;
use stockroom_api::store::MemoryStore;
use stockroom_api::AppState;

pub const USER: &str = "usr0000000000001";

const MULTIPART_BOUNDARY: &str = "stockroom-test-boundary";

/// Analyzer double: hands out scripted results in order and counts calls, so
/// tests can assert how many paid analyses a flow would have triggered.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    scripted: Mutex<VecDeque<Result<AnalysisResult, String>>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn push_ok(&self, result: AnalysisResult) {
        self.scripted.lock().unwrap().push_back(Ok(result));
    }

    pub fn push_err(&self, message: &str) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAnalyzer for ScriptedAnalyzer {
    async fn analyze_image(
        &self,
        _jpeg: &[u8],
        _categories: &CategoryLibrary,
    ) -> Result<AnalysisResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripted.lock().unwrap().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(ServiceError::ExternalServiceError(message)),
            None => Err(ServiceError::ExternalServiceError(
                "no scripted analysis left".to_string(),
            )),
        }
    }
}

/// Test application backed by the in-memory store and a scripted analyzer.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub analyzer: Arc<ScriptedAnalyzer>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let analyzer = Arc::new(ScriptedAnalyzer::default());
        let services = AppServices::new(store.clone(), analyzer.clone(), &config);
        let state = AppState { config, services };

        let router = Router::new()
            .nest("/api/v1", stockroom_api::api_v1_routes())
            .with_state(state);

        Self {
            router,
            store,
            analyzer,
        }
    }

    /// JSON request carrying the owner header every mutating endpoint expects.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-ref", USER);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// Same as [`Self::request`] but without the owner header.
    pub async fn request_anonymous(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// Multipart upload against the ingestion endpoint.
    pub async fn upload_image(&self, filename: &str, bytes: &[u8]) -> Response {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/images/process")
            .header("x-user-ref", USER)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build upload request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during upload")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response body")
}

fn test_config() -> AppConfig {
    AppConfig {
        store_url: "http://localhost:8090".to_string(),
        store_token: None,
        ai_api_url: "http://localhost:1".to_string(),
        ai_api_key: None,
        ai_model: "test-model".to_string(),
        app_base_url: "http://app.local".to_string(),
        jpeg_quality: 80,
        http_timeout_secs: 5,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
    }
}

/// Small decodable PNG whose bytes vary with `seed`.
pub fn sample_png(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(8, 8, |x, y| {
        image::Rgb([seed.wrapping_add((x * 16) as u8), (y * 16) as u8, seed])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode sample png");
    out.into_inner()
}

pub fn item_analysis(label: &str) -> ItemAnalysis {
    ItemAnalysis {
        item_label: label.to_string(),
        item_name: String::new(),
        item_notes: String::new(),
        category_functional: "Tools".to_string(),
        category_specific: "Power Tools".to_string(),
        item_type: "Drill".to_string(),
        item_manufacturer: "Makita".to_string(),
        item_attributes: vec![],
    }
}

pub fn item_result(label: &str) -> AnalysisResult {
    AnalysisResult::Item(ItemImageAnalysis {
        image_label: format!("{label} photo"),
        image_notes: String::new(),
        item: item_analysis(label),
    })
}

pub fn container_result(label: &str, item_labels: &[&str]) -> AnalysisResult {
    AnalysisResult::Container(ContainerImageAnalysis {
        image_label: format!("{label} photo"),
        image_notes: String::new(),
        container: ContainerAnalysis {
            container_label: label.to_string(),
            container_notes: String::new(),
            container_items: item_labels.iter().map(|l| item_analysis(l)).collect(),
        },
    })
}
