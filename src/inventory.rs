use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory service not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("no inventory record for {0}")]
    Unknown(String),
}

#[async_trait]
pub trait InventoryLookup: Send + Sync {
    async fn quantity(&self, upc: &str) -> Result<i64, InventoryError>;
}

pub struct NoInventory;

#[async_trait]
impl InventoryLookup for NoInventory {
    async fn quantity(&self, _upc: &str) -> Result<i64, InventoryError> {
        Err(InventoryError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct InventoryRecord {
    quantity: i64,
}

/// Talks to an inventory service exposing `GET {base}/inventory/{upc}`.
pub struct HttpInventory {
    client: Client,
    base_url: Url,
}

impl HttpInventory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InventoryError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw).map_err(|e| InventoryError::Http(format!("invalid inventory URL {raw:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InventoryError::Http(format!("invalid inventory URL {raw:?}")));
        }
        let client = Client::builder().timeout(timeout).build().map_err(|e| InventoryError::Http(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// The upc is pushed as a single escaped path segment.
    fn record_url(&self, upc: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("inventory").push(upc);
        }
        url
    }
}

#[async_trait]
impl InventoryLookup for HttpInventory {
    async fn quantity(&self, upc: &str) -> Result<i64, InventoryError> {
        let url = self.record_url(upc);
        let response = self.client.get(url).send().await.map_err(|e| InventoryError::Http(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(InventoryError::Unknown(upc.to_string()));
        }
        if !status.is_success() {
            return Err(InventoryError::Http(format!("status={}", status)));
        }
        let record: InventoryRecord = response.json().await.map_err(|e| InventoryError::Http(e.to_string()))?;
        Ok(record.quantity)
    }
}
