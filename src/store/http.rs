use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::ServiceError;
use crate::store::{CollectionStore, ListQuery, RecordPage, StoredFile};

/// HTTP client for the hosted collection store.
pub struct HttpStore {
    base_url: String,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    page: u64,
    #[serde(rename = "perPage")]
    per_page: u64,
    #[serde(rename = "totalItems")]
    total_items: u64,
    items: Vec<Value>,
}

impl HttpStore {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
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
            base_url,
            token,
            client,
        })
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ServiceError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| ServiceError::StoreError(format!("store request failed: {e}")))
    }

    /// Maps a non-success store response onto the error taxonomy; the body is
    /// included for diagnostics but never surfaced to API clients.
    async fn check(response: Response, context: &str) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ServiceError::NotFound(context.to_string())),
            StatusCode::CONFLICT => Err(ServiceError::Conflict(context.to_string())),
            _ => Err(ServiceError::StoreError(format!(
                "{context}: store responded {status}: {body}"
            ))),
        }
    }

    async fn json(response: Response) -> Result<Value, ServiceError> {
        response
            .json()
            .await
            .map_err(|e| ServiceError::StoreError(format!("store returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl CollectionStore for HttpStore {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<RecordPage, ServiceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("perPage", query.per_page.to_string()),
        ];
        if let Some(filter) = &query.filter {
            params.push(("filter", filter.to_query()));
        }
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        if let Some(expand) = &query.expand {
            params.push(("expand", expand.clone()));
        }

        debug!(collection, page = query.page, "listing records");
        let response = self
            .send(self.client.get(self.records_url(collection)).query(&params))
            .await?;
        let response = Self::check(response, &format!("list {collection}")).await?;
        let parsed: ListResponse = serde_json::from_value(Self::json(response).await?)
            .map_err(|e| ServiceError::StoreError(format!("unexpected list shape: {e}")))?;

        Ok(RecordPage {
            items: parsed.items,
            total_items: parsed.total_items,
            page: parsed.page,
            per_page: parsed.per_page,
        })
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Option<Value>, ServiceError> {
        let mut request = self.client.get(self.record_url(collection, id));
        if let Some(expand) = expand {
            request = request.query(&[("expand", expand)]);
        }
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, &format!("get {collection}/{id}")).await?;
        Ok(Some(Self::json(response).await?))
    }

    async fn create(&self, collection: &str, fields: Value) -> Result<Value, ServiceError> {
        let response = self
            .send(self.client.post(self.records_url(collection)).json(&fields))
            .await?;
        let response = Self::check(response, &format!("create {collection}")).await?;
        Self::json(response).await
    }

    async fn create_with_file(
        &self,
        collection: &str,
        fields: Value,
        file: StoredFile,
    ) -> Result<Value, ServiceError> {
        let mut form = multipart::Form::new();
        if let Value::Object(map) = fields {
            for (key, value) in map {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                form = form.text(key, text);
            }
        }
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)
            .map_err(|e| ServiceError::InternalError(format!("invalid upload mime type: {e}")))?;
        form = form.part(file.field, part);

        let response = self
            .send(self.client.post(self.records_url(collection)).multipart(form))
            .await?;
        let response = Self::check(response, &format!("create {collection} with file")).await?;
        Self::json(response).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value, ServiceError> {
        let response = self
            .send(self.client.patch(self.record_url(collection, id)).json(&patch))
            .await?;
        let response = Self::check(response, &format!("{collection} record {id}")).await?;
        Self::json(response).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError> {
        let response = self
            .send(self.client.delete(self.record_url(collection, id)))
            .await?;
        Self::check(response, &format!("{collection} record {id}")).await?;
        Ok(())
    }

    async fn download_file(
        &self,
        collection: &str,
        record_id: &str,
        filename: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let url = self.file_url(collection, record_id, filename);
        let response = self.send(self.client.get(&url)).await?;
        let response = Self::check(response, &format!("file {collection}/{record_id}")).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::StoreError(format!("file download failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn file_url(&self, collection: &str, record_id: &str, filename: &str) -> String {
        format!(
            "{}/api/files/{}/{}/{}",
            self.base_url, collection, record_id, filename
        )
    }
}
