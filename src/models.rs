use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub upc: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub category: Option<String>,
    pub has_image: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub upc: String,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Create input that has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub upc: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl TryFrom<CreateProductRequest> for NewProduct {
    type Error = CatalogError;

    fn try_from(req: CreateProductRequest) -> Result<Self, Self::Error> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is required".into()));
        }
        let upc = req.upc.trim().to_string();
        if upc.is_empty() {
            return Err(CatalogError::Validation("upc is required".into()));
        }
        let price = req.price.ok_or_else(|| CatalogError::Validation("price is required".into()))?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(CatalogError::Validation("price must not be negative".into()));
        }
        let mut price = price.round_dp(2);
        price.rescale(2);
        Ok(Self {
            name,
            upc,
            price,
            description: req.description.filter(|d| !d.trim().is_empty()),
            category: req.category.filter(|c| !c.trim().is_empty()),
        })
    }
}

/// Stock level for a product, or the reason it could not be looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub upc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InventoryStatus {
    pub fn available(upc: &str, quantity: i64) -> Self {
        Self { upc: upc.to_string(), quantity: Some(quantity), error: None }
    }

    pub fn failed(upc: &str, error: impl Into<String>) -> Self {
        Self { upc: upc.to_string(), quantity: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub inventory: InventoryStatus,
}
