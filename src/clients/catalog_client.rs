use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::actor_framework::ResourceClient;
use crate::domain::{Product, ProductCreate, ProductPatch};
use crate::product_actor::{ProductAction, ProductActionResult, ProductError};

/// Client for interacting with the catalog actor.
#[derive(Clone)]
pub struct CatalogClient {
    inner: ResourceClient<Product>,
}

crate::impl_basic_client!(CatalogClient, Product, ProductError, product);

impl CatalogClient {
    #[instrument(skip(self, payload), fields(name = %payload.name))]
    pub async fn create_product(&self, payload: ProductCreate) -> Result<String, ProductError> {
        debug!("Sending request");
        self.inner
            .create(payload)
            .await
            .map(|created| created.id)
            .map_err(ProductError::from)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        id: &str,
        patch: ProductPatch,
    ) -> Result<Product, ProductError> {
        debug!("Sending request");
        self.inner
            .update(id.to_string(), patch)
            .await
            .map_err(ProductError::from)
    }

    /// Returns the price that was replaced. Placed orders keep their snapshot.
    #[instrument(skip(self))]
    pub async fn reprice(
        &self,
        id: &str,
        variant: Option<&str>,
        price: Decimal,
    ) -> Result<Decimal, ProductError> {
        debug!("Sending request");
        let action = ProductAction::Reprice {
            variant: variant.map(str::to_string),
            price,
        };
        match self.inner.perform_action(id.to_string(), action).await? {
            ProductActionResult::Reprice(previous) => Ok(previous),
        }
    }

    /// Orderable products, by name.
    #[instrument(skip(self))]
    pub async fn list_available(&self) -> Result<Vec<Product>, ProductError> {
        let mut products = self.inner.query(|product: &Product| product.available).await?;
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}
