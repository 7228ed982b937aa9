use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::models::{NewProduct, Product};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>>;
    async fn get(&self, id: i64) -> Result<Option<Product>>;
    /// Fails with `DuplicateCode` when the upc is already taken.
    async fn insert(&self, product: NewProduct) -> Result<Product>;
    async fn mark_has_image(&self, id: i64) -> Result<Option<Product>>;
    async fn close(&self) {}
}

#[derive(Default)]
struct MemoryInner {
    rows: BTreeMap<i64, Product>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryProductStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo catalog used when no database is configured.
    pub fn with_samples() -> Self {
        let store = Self::new();
        let samples = [
            ("Smartphone X", "123456789012", 79999, "Latest smartphone with advanced features"),
            ("Laptop Pro", "123456789013", 129999, "High-performance laptop for professionals"),
            ("Wireless Headphones", "123456789014", 14999, "Premium noise-cancelling headphones"),
            ("Smart Watch", "123456789015", 24999, "Fitness and health tracking smartwatch"),
            ("Tablet Ultra", "123456789016", 49999, "Lightweight tablet with high-resolution display"),
        ];
        {
            let mut inner = store.inner.write();
            for (name, upc, cents, description) in samples {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.rows.insert(id, Product {
                    id,
                    name: name.into(),
                    upc: upc.into(),
                    price: Decimal::new(cents, 2),
                    description: Some(description.into()),
                    category: None,
                    has_image: false,
                });
            }
        }
        store
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.inner.read().rows.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.inner.read().rows.get(&id).cloned())
    }

    async fn insert(&self, product: NewProduct) -> Result<Product> {
        let mut inner = self.inner.write();
        if inner.rows.values().any(|p| p.upc == product.upc) {
            return Err(CatalogError::DuplicateCode(product.upc));
        }
        inner.next_id += 1;
        let row = Product {
            id: inner.next_id,
            name: product.name,
            upc: product.upc,
            price: product.price,
            description: product.description,
            category: product.category,
            has_image: false,
        };
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn mark_has_image(&self, id: i64) -> Result<Option<Product>> {
        let mut inner = self.inner.write();
        Ok(inner.rows.get_mut(&id).map(|p| {
            p.has_image = true;
            p.clone()
        }))
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS products (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    upc VARCHAR(255) UNIQUE NOT NULL,
    price NUMERIC(10,2) NOT NULL,
    description TEXT,
    category VARCHAR(64),
    has_image BOOLEAN NOT NULL DEFAULT FALSE
)";

const COLUMNS: &str = "id, name, upc, price, description, category, has_image";

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!("🗄️ Connected to Postgres catalog (max {} connections)", max_connections);
        Ok(Self { pool })
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products ORDER BY id ASC");
        Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn insert(&self, product: NewProduct) -> Result<Product> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE upc = $1")
            .bind(&product.upc)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(CatalogError::DuplicateCode(product.upc));
        }
        let sql = format!(
            "INSERT INTO products (name, upc, price, description, category) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.upc)
            .bind(product.price)
            .bind(&product.description)
            .bind(&product.category)
            .fetch_one(&self.pool)
            .await;
        match inserted {
            Ok(row) => Ok(row),
            // a concurrent insert can still win the race past the pre-check
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(CatalogError::DuplicateCode(product.upc)),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_has_image(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("UPDATE products SET has_image = TRUE WHERE id = $1 RETURNING {COLUMNS}");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("🗄️ Postgres pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(upc: &str) -> NewProduct {
        NewProduct {
            name: "Lumina Glow Cascade".into(),
            upc: upc.into(),
            price: Decimal::new(12050, 2),
            description: None,
            category: Some("lighting".into()),
        }
    }

    #[tokio::test]
    async fn assigns_ascending_ids_and_lists_in_order() {
        let store = MemoryProductStore::new();
        let a = store.insert(new_product("1")).await.unwrap();
        let b = store.insert(new_product("2")).await.unwrap();
        assert!(a.id < b.id);
        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn duplicate_upc_is_rejected_without_a_second_row() {
        let store = MemoryProductStore::new();
        store.insert(new_product("555")).await.unwrap();
        let err = store.insert(new_product("555")).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCode(ref upc) if upc == "555"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn marks_has_image_once_set() {
        let store = MemoryProductStore::new();
        let p = store.insert(new_product("9")).await.unwrap();
        assert!(!p.has_image);
        let updated = store.mark_has_image(p.id).await.unwrap().unwrap();
        assert!(updated.has_image);
        assert!(store.get(p.id).await.unwrap().unwrap().has_image);
        assert!(store.mark_has_image(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn samples_seed_five_products() {
        let store = MemoryProductStore::with_samples();
        let rows = store.list().await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].name, "Smartphone X");
        assert_eq!(rows[0].price, Decimal::new(79999, 2));
        let next = store.insert(new_product("42")).await.unwrap();
        assert_eq!(next.id, 6);
    }
}
