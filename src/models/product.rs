use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

/// A catalog product as handed over by the product store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct Product {
    /// Store identifier.
    #[validate(length(min = 1, message = "Product id cannot be empty"))]
    pub id: String,

    #[validate(length(max = 255, message = "Product name too long"))]
    pub name: String,

    #[validate(length(max = 100, message = "Category too long"))]
    pub category: String,

    pub supplier: Option<String>,

    /// Units on hand.
    pub current_stock: u32,

    /// Stock level at or below which the product counts as low.
    pub reorder_level: u32,

    /// Supplier lead time in days.
    #[validate(range(min = 0.0, message = "must be non-negative"))]
    pub lead_time: f64,

    #[validate(range(min = 0.0, message = "must be non-negative"))]
    pub purchase_price: f64,

    #[validate(range(min = 0.0, message = "must be non-negative"))]
    pub selling_price: f64,

    /// Raw sales record: a `{"Day-N": quantity}` object, a string holding
    /// one, or anything else the store had. Interpreted by `ml::series`.
    #[schema(value_type = Object)]
    pub historical_sales: Value,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_stock(mut self, current_stock: u32, reorder_level: u32) -> Self {
        self.current_stock = current_stock;
        self.reorder_level = reorder_level;
        self
    }

    pub fn with_sales(mut self, historical_sales: Value) -> Self {
        self.historical_sales = historical_sales;
        self
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_missing_fields() {
        let product: Product = serde_json::from_value(json!({
            "id": "SKU-1",
            "name": "Hammer",
            "category": "Tools",
            "current_stock": 3,
            "historical_sales": "{\"Day-1\": 2}"
        }))
        .unwrap();

        assert_eq!(product.reorder_level, 0);
        assert_eq!(product.supplier, None);
        assert_eq!(product.historical_sales, json!("{\"Day-1\": 2}"));
        assert!(product.validate().is_ok());
    }

    #[test]
    fn rejects_negative_prices_and_empty_ids() {
        let mut product = Product::new("", "Saw", "Tools");
        product.selling_price = -1.0;
        let errors = product.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("id"));
        assert!(fields.contains_key("selling_price"));
    }

    #[test]
    fn low_stock_includes_the_reorder_level() {
        assert!(Product::new("a", "a", "x").with_stock(5, 5).is_low_stock());
        assert!(!Product::new("a", "a", "x").with_stock(6, 5).is_low_stock());
    }
}
