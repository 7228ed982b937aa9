use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::events::{publish_detached, CatalogEvent, EventPublisher, LogPublisher, NatsPublisher};
use crate::generator;
use crate::image_gen;
use crate::images::{sniff_content_type, DirImageStore, ImageStore, MemoryImageStore, StoredImage};
use crate::inventory::{HttpInventory, InventoryLookup, NoInventory};
use crate::models::{InventoryStatus, NewProduct, Product, ProductDetail};
use crate::store::{MemoryProductStore, PgProductStore, ProductStore};

/// Application-scoped catalog service. Every backend is injected, and
/// `shutdown` is the only place connections are released.
pub struct Catalog {
    products: Arc<dyn ProductStore>,
    images: Arc<dyn ImageStore>,
    events: Arc<dyn EventPublisher>,
    inventory: Arc<dyn InventoryLookup>,
    topic: String,
}

impl Catalog {
    pub fn new(
        products: Arc<dyn ProductStore>,
        images: Arc<dyn ImageStore>,
        events: Arc<dyn EventPublisher>,
        inventory: Arc<dyn InventoryLookup>,
        topic: impl Into<String>,
    ) -> Self {
        Self { products, images, events, inventory, topic: topic.into() }
    }

    /// All in-memory backends, seeded with the demo products.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryProductStore::with_samples()),
            Arc::new(MemoryImageStore::new()),
            Arc::new(LogPublisher),
            Arc::new(NoInventory),
            "products",
        )
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let products: Arc<dyn ProductStore> = match &config.database_url {
            Some(url) => Arc::new(PgProductStore::connect(url, config.db_max_connections).await?),
            None => {
                info!("📦 DATABASE_URL not set, using in-memory demo catalog");
                Arc::new(MemoryProductStore::with_samples())
            }
        };
        let images: Arc<dyn ImageStore> = match &config.image_dir {
            Some(dir) => Arc::new(DirImageStore::new(dir.clone())),
            None => Arc::new(MemoryImageStore::new()),
        };
        let events: Arc<dyn EventPublisher> = match &config.nats_url {
            Some(url) => Arc::new(NatsPublisher::connect(url).await?),
            None => Arc::new(LogPublisher),
        };
        let inventory: Arc<dyn InventoryLookup> = match &config.inventory_url {
            Some(url) => Arc::new(HttpInventory::new(url.clone(), config.inventory_timeout)?),
            None => Arc::new(NoInventory),
        };
        Ok(Self::new(products, images, events, inventory, config.event_topic.clone()))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.products.list().await
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let product = self.products.insert(new).await?;
        info!("✅ Created product #{} ({})", product.id, product.name);
        publish_detached(
            self.events.clone(),
            self.topic.clone(),
            CatalogEvent::ProductCreated {
                id: product.id,
                name: product.name.clone(),
                upc: product.upc.clone(),
                price: product.price,
                description: product.description.clone(),
                occurred_at: Utc::now(),
            },
        );
        Ok(product)
    }

    pub async fn get_product(&self, id: i64) -> Result<ProductDetail> {
        let product = self.products.get(id).await?.ok_or(CatalogError::NotFound)?;
        let inventory = match self.inventory.quantity(&product.upc).await {
            Ok(quantity) => InventoryStatus::available(&product.upc, quantity),
            Err(e) => {
                warn!("⚠️ Inventory lookup failed for {}: {}", product.upc, e);
                InventoryStatus::failed(&product.upc, e.to_string())
            }
        };
        Ok(ProductDetail { product, inventory })
    }

    /// Serves the stored image, synthesizing and caching one on a miss.
    pub async fn get_image(&self, id: i64) -> Result<StoredImage> {
        let product = self.products.get(id).await?.ok_or(CatalogError::NotFound)?;
        let image = match self.images.get(id).await? {
            Some(image) => image,
            None => {
                info!("🎨 No stored image for product {}, generating one", id);
                let hint = product.category.as_deref().unwrap_or(&product.name);
                let image: StoredImage = image_gen::generate(id, Some(hint)).into();
                self.images.put(id, image.clone()).await?;
                image
            }
        };
        if !product.has_image {
            let products = self.products.clone();
            tokio::spawn(async move {
                if let Err(e) = products.mark_has_image(id).await {
                    warn!("⚠️ Failed to set has_image for product {}: {}", id, e);
                }
            });
        }
        Ok(image)
    }

    pub async fn upload_image(&self, id: i64, bytes: Bytes, content_type: Option<String>) -> Result<Product> {
        if self.products.get(id).await?.is_none() {
            return Err(CatalogError::NotFound);
        }
        let content_type = content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| sniff_content_type(&bytes).to_string());
        info!("📤 Storing image for product {} ({} bytes, {})", id, bytes.len(), content_type);
        self.images.put(id, StoredImage { bytes, content_type: content_type.clone() }).await?;
        let product = self.products.mark_has_image(id).await?.ok_or(CatalogError::NotFound)?;
        publish_detached(
            self.events.clone(),
            self.topic.clone(),
            CatalogEvent::ImageUploaded {
                product_id: id,
                content_type,
                version_id: Uuid::new_v4().to_string(),
                occurred_at: Utc::now(),
            },
        );
        Ok(product)
    }

    /// Creates a product from a random product line together with its image.
    ///
    /// Not atomic: if storing the image fails the error is returned, but the
    /// row and its `product_created` event remain with `has_image` unset.
    /// The next `get_image` regenerates the same placeholder and sets the flag.
    pub async fn create_random_product(&self) -> Result<Product> {
        let draft = generator::random_draft(&mut rand::thread_rng());
        let product = self.create_product(draft.into()).await?;
        let hint = product.category.as_deref().unwrap_or(&product.name);
        self.images.put(product.id, image_gen::generate(product.id, Some(hint)).into()).await?;
        let product = self.products.mark_has_image(product.id).await?.ok_or(CatalogError::NotFound)?;
        info!("🎲 Generated random product #{} ({})", product.id, product.name);
        Ok(product)
    }

    pub async fn shutdown(&self) {
        info!("🛑 Closing catalog connections");
        self.products.close().await;
        self.events.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::RecordingPublisher;
    use crate::inventory::InventoryError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct FixedInventory(i64);

    #[async_trait]
    impl InventoryLookup for FixedInventory {
        async fn quantity(&self, _upc: &str) -> std::result::Result<i64, InventoryError> {
            Ok(self.0)
        }
    }

    fn catalog_with(events: Arc<dyn EventPublisher>, inventory: Arc<dyn InventoryLookup>) -> Catalog {
        Catalog::new(
            Arc::new(MemoryProductStore::new()),
            Arc::new(MemoryImageStore::new()),
            events,
            inventory,
            "products",
        )
    }

    fn lamp(upc: &str) -> NewProduct {
        NewProduct {
            name: "Lumina Ambient Halo".into(),
            upc: upc.into(),
            price: Decimal::new(11999, 2),
            description: Some("warm".into()),
            category: None,
        }
    }

    async fn settle<F: Fn() -> bool>(check: F) {
        for _ in 0..50 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn create_publishes_product_created() {
        let events = Arc::new(RecordingPublisher::default());
        let catalog = catalog_with(events.clone(), Arc::new(NoInventory));
        let product = catalog.create_product(lamp("100")).await.unwrap();
        settle(|| !events.recorded().is_empty()).await;
        let recorded = events.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "products");
        assert!(matches!(&recorded[0].1, CatalogEvent::ProductCreated { id, .. } if *id == product.id));
    }

    #[tokio::test]
    async fn duplicate_code_fails_and_leaves_one_row() {
        let catalog = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(NoInventory));
        catalog.create_product(lamp("200")).await.unwrap();
        let err = catalog.create_product(lamp("200")).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCode(_)));
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_failure_never_reaches_the_caller() {
        let catalog = catalog_with(Arc::new(RecordingPublisher::failing()), Arc::new(NoInventory));
        assert!(catalog.create_product(lamp("300")).await.is_ok());
    }

    #[tokio::test]
    async fn product_detail_carries_inventory_or_its_failure() {
        let ok = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(FixedInventory(5)));
        let p = ok.create_product(lamp("400")).await.unwrap();
        assert_eq!(ok.get_product(p.id).await.unwrap().inventory, InventoryStatus::available("400", 5));

        let missing = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(NoInventory));
        let p = missing.create_product(lamp("401")).await.unwrap();
        let detail = missing.get_product(p.id).await.unwrap();
        assert_eq!(detail.inventory.quantity, None);
        assert_eq!(detail.inventory.error.as_deref(), Some("inventory service not configured"));

        assert!(matches!(missing.get_product(999).await, Err(CatalogError::NotFound)));
    }

    #[tokio::test]
    async fn image_miss_generates_caches_and_flags_product() {
        let catalog = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(NoInventory));
        let p = catalog.create_product(lamp("500")).await.unwrap();

        let first = catalog.get_image(p.id).await.unwrap();
        assert_eq!(first.content_type, "image/svg+xml");
        assert!(String::from_utf8_lossy(&first.bytes).contains("Category: lighting"));
        let second = catalog.get_image(p.id).await.unwrap();
        assert_eq!(first, second);

        let products = catalog.products.clone();
        let mut flagged = false;
        for _ in 0..50 {
            if products.get(p.id).await.unwrap().unwrap().has_image {
                flagged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(flagged);
    }

    #[tokio::test]
    async fn image_for_unknown_product_is_not_found() {
        let catalog = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(NoInventory));
        assert!(matches!(catalog.get_image(42).await, Err(CatalogError::NotFound)));
        let upload = catalog.upload_image(42, Bytes::from_static(b"x"), None).await;
        assert!(matches!(upload, Err(CatalogError::NotFound)));
    }

    #[tokio::test]
    async fn upload_stores_bytes_and_flags_synchronously() {
        let events = Arc::new(RecordingPublisher::default());
        let catalog = catalog_with(events.clone(), Arc::new(NoInventory));
        let p = catalog.create_product(lamp("600")).await.unwrap();
        let png = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

        let updated = catalog.upload_image(p.id, png.clone(), None).await.unwrap();
        assert!(updated.has_image);
        let stored = catalog.get_image(p.id).await.unwrap();
        assert_eq!(stored.bytes, png);
        assert_eq!(stored.content_type, "image/png");

        settle(|| events.recorded().len() == 2).await;
        assert!(events
            .recorded()
            .iter()
            .any(|(_, e)| matches!(e, CatalogEvent::ImageUploaded { product_id, .. } if *product_id == p.id)));
    }

    /// Rejects the first write, then behaves like the memory store.
    #[derive(Default)]
    struct FirstPutFails {
        inner: MemoryImageStore,
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ImageStore for FirstPutFails {
        async fn get(&self, id: i64) -> Result<Option<StoredImage>> {
            self.inner.get(id).await
        }

        async fn put(&self, id: i64, image: StoredImage) -> Result<()> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(CatalogError::Upstream("disk full".into()));
            }
            self.inner.put(id, image).await
        }
    }

    #[tokio::test]
    async fn random_product_left_without_image_is_healed_on_read() {
        let catalog = Catalog::new(
            Arc::new(MemoryProductStore::new()),
            Arc::new(FirstPutFails::default()),
            Arc::new(RecordingPublisher::default()),
            Arc::new(NoInventory),
            "products",
        );
        assert!(matches!(catalog.create_random_product().await, Err(CatalogError::Upstream(_))));
        let listed = catalog.list_products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].has_image);

        let image = catalog.get_image(listed[0].id).await.unwrap();
        assert_eq!(image.content_type, "image/svg+xml");
        let products = catalog.products.clone();
        let id = listed[0].id;
        let mut flagged = false;
        for _ in 0..50 {
            if products.get(id).await.unwrap().unwrap().has_image {
                flagged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(flagged);
    }

    #[tokio::test]
    async fn random_product_arrives_with_an_image() {
        let catalog = catalog_with(Arc::new(RecordingPublisher::default()), Arc::new(NoInventory));
        let product = catalog.create_random_product().await.unwrap();
        assert!(product.has_image);
        assert!(product.category.is_some());
        let listed = catalog.list_products().await.unwrap();
        assert_eq!(listed, vec![product.clone()]);
        let image = catalog.get_image(product.id).await.unwrap();
        assert!(!image.bytes.is_empty());
        assert_eq!(image.content_type, "image/svg+xml");
    }
}
