use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A named cut or preparation with its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub name: String,
    pub price: Decimal,
}

/// Represents a product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub unit: String,
    pub variants: Vec<ProductVariant>,
    pub available: bool,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_price: Decimal,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: String::new(),
            base_price,
            unit: unit.into(),
            variants: Vec::new(),
            available: true,
        }
    }

    pub fn with_variant(mut self, name: impl Into<String>, price: Decimal) -> Self {
        self.variants.push(ProductVariant {
            name: name.into(),
            price,
        });
        self
    }
}

/// Payload for adding a product to the catalog.
#[derive(Debug, Clone)]
pub struct ProductCreate {
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub unit: String,
    pub variants: Vec<ProductVariant>,
}

impl From<Product> for ProductCreate {
    fn from(product: Product) -> Self {
        Self {
            name: product.name,
            category: product.category,
            base_price: product.base_price,
            unit: product.unit,
            variants: product.variants,
        }
    }
}

/// Listing fields. Prices change through `ProductAction::Reprice`.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub available: Option<bool>,
}

/// Unit price for a cart line: the selected variant's price when the product
/// has a variant of that name, otherwise the base price.
pub fn resolve_price(product: &Product, variant: Option<&str>) -> Decimal {
    variant
        .and_then(|name| product.variants.iter().find(|v| v.name == name))
        .map(|v| v.price)
        .unwrap_or(product.base_price)
}
