use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{errors::ServiceError, models::product::Product};

/// Read access to the product store
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks up one product; `NotFound` when the id is unknown
    async fn product(&self, product_id: &str) -> Result<Product, ServiceError>;

    /// Every product in the catalog, ordered by id
    async fn all_products(&self) -> Result<Vec<Product>, ServiceError>;
}

/// Catalog held in memory, keyed by product id
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    products: Arc<DashMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from products, skipping any that fail validation
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            if let Err(err) = catalog.insert(product) {
                warn!(error = %err, "skipping invalid product");
            }
        }
        catalog
    }

    /// Loads a JSON array of products from disk
    #[instrument]
    pub fn load_from_file(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        let products: Vec<Product> = serde_json::from_str(&raw)
            .map_err(|e| ServiceError::InvalidInput(format!("{}: {}", path.display(), e)))?;

        let catalog = Self::from_products(products);
        info!(products = catalog.len(), path = %path.display(), "catalog loaded");
        Ok(catalog)
    }

    /// Inserts or replaces a product
    pub fn insert(&self, product: Product) -> Result<(), ServiceError> {
        product.validate()?;
        self.products.insert(product.id.clone(), product);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product(&self, product_id: &str) -> Result<Product, ServiceError> {
        self.products
            .get(product_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))
    }

    async fn all_products(&self) -> Result<Vec<Product>, ServiceError> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }
}
