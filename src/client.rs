use bytes::Bytes;
use reqwest::{header, multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::chatbot::ChatReply;
use crate::images::StoredImage;
use crate::intent::ChatContext;
use crate::models::{CreateProductRequest, Product, ProductDetail};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<ClientError> },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http(e) => e.status(),
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Exhausted { last, .. } => last.status(),
        }
    }

    /// Transport failures and 5xx responses; a 4xx will not change on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.status().map_or(true, |s| s.is_server_error()),
            ClientError::Status { status, .. } => status.is_server_error(),
            ClientError::Exhausted { .. } => false,
        }
    }
}

/// Exponential backoff for image fetches: `retries` extra attempts after the
/// first failure, waiting `base_delay * 2^n` before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 3, base_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

pub struct CatalogClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        decode(self.http.get(self.url("/api/products")).send().await?).await
    }

    pub async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ClientError> {
        decode(self.http.post(self.url("/api/products")).json(req).send().await?).await
    }

    pub async fn create_random_product(&self) -> Result<Product, ClientError> {
        decode(self.http.post(self.url("/api/random-product")).send().await?).await
    }

    pub async fn product(&self, id: i64) -> Result<ProductDetail, ClientError> {
        decode(self.http.get(self.url(&format!("/api/products/{id}"))).send().await?).await
    }

    pub async fn upload_image(
        &self,
        id: i64,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<Product, ClientError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string()).mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);
        let url = self.url(&format!("/api/products/{id}/image"));
        decode(self.http.post(url).multipart(form).send().await?).await
    }

    /// Fetches a product image, retrying transient failures under the
    /// configured backoff. A freshly created product may not have its image
    /// readable yet. Client errors such as 404 are returned immediately.
    pub async fn image(&self, id: i64) -> Result<StoredImage, ClientError> {
        let mut retry = 0;
        loop {
            match self.fetch_image(id).await {
                Ok(image) => return Ok(image),
                Err(e) if e.is_transient() && retry < self.retry.retries => {
                    let delay = self.retry.delay(retry);
                    warn!("⚠️ Image for product {} failed to load ({}), retrying in {:?}", id, e, delay);
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(ClientError::Exhausted { attempts: retry + 1, last: Box::new(e) })
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_image(&self, id: i64) -> Result<StoredImage, ClientError> {
        let response = check(self.http.get(self.url(&format!("/api/products/{id}/image"))).send().await?).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes: Bytes = response.bytes().await?;
        Ok(StoredImage { bytes, content_type })
    }

    pub async fn chat(&self, message: &str, context: &ChatContext) -> Result<ChatReply, ClientError> {
        let body = json!({ "message": message, "context": context });
        decode(self.http.post(self.url("/api/chatbot")).json(&body).send().await?).await
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text);
    Err(ClientError::Status { status, message })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(check(response).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_the_base_delay() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..policy.retries).map(|n| policy.delay(n)).collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(500), Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[test]
    fn only_server_errors_are_transient() {
        let status = |status| ClientError::Status { status, message: String::new() };
        assert!(status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
        assert!(status(StatusCode::INTERNAL_SERVER_ERROR).is_transient());
        assert!(!status(StatusCode::NOT_FOUND).is_transient());
        assert!(!status(StatusCode::BAD_REQUEST).is_transient());
    }

    #[test]
    fn exhausted_errors_keep_the_last_status() {
        let err = ClientError::Exhausted {
            attempts: 4,
            last: Box::new(ClientError::Status { status: StatusCode::NOT_FOUND, message: String::new() }),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().starts_with("gave up after 4 attempts"));
    }
}
