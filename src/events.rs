use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CatalogEvent {
    ProductCreated {
        id: i64,
        name: String,
        upc: String,
        price: Decimal,
        description: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    ImageUploaded {
        product_id: i64,
        content_type: String,
        version_id: String,
        occurred_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &CatalogEvent) -> Result<(), PublishError>;
    async fn close(&self) {}
}

/// Fire-and-forget: the caller never waits on the bus, failures are only logged.
pub fn publish_detached(publisher: Arc<dyn EventPublisher>, topic: String, event: CatalogEvent) {
    tokio::spawn(async move {
        if let Err(e) = publisher.publish(&topic, &event).await {
            warn!("⚠️ Failed to publish event to '{}': {}", topic, e);
        }
    });
}

/// Used when no message bus is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, topic: &str, event: &CatalogEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        info!("📣 [{}] {}", topic, payload);
        Ok(())
    }
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self, PublishError> {
        let client = async_nats::connect(url).await.map_err(|e| PublishError::Transport(e.to_string()))?;
        info!("📡 Connected to NATS at {}", url);
        Ok(Self { client })
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, topic: &str, event: &CatalogEvent) -> Result<(), PublishError> {
        let payload = Bytes::from(serde_json::to_vec(event)?);
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            warn!("⚠️ NATS flush on shutdown failed: {}", e);
        }
    }
}
