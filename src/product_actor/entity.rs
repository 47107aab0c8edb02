use rust_decimal::Decimal;

use super::actions::{ProductAction, ProductActionResult};
use crate::actor_framework::Entity;
use crate::domain::{Product, ProductCreate, ProductPatch};

impl Entity for Product {
    type Id = String;
    type CreatePayload = ProductCreate;
    type Patch = ProductPatch;
    type Action = ProductAction;
    type ActionResult = ProductActionResult;
    type Context = ();

    fn id(&self) -> &String {
        &self.id
    }

    /// Creates a new Product from creation parameters.
    ///
    /// # Arguments
    /// * `id` - Unique identifier for the product
    /// * `params` - name, category, unit and prices
    fn from_create(id: String, params: ProductCreate, _context: &mut ()) -> Result<Self, String> {
        if params.name.is_empty() {
            return Err("product name required".to_string());
        }
        if params.base_price < Decimal::ZERO {
            return Err(format!("negative base price: {}", params.base_price));
        }
        if let Some(variant) = params.variants.iter().find(|v| v.price < Decimal::ZERO) {
            return Err(format!("negative price for variant {}", variant.name));
        }

        Ok(Self {
            id,
            name: params.name,
            category: params.category,
            base_price: params.base_price,
            unit: params.unit,
            variants: params.variants,
            available: true,
        })
    }

    /// Updates listing fields.
    ///
    /// # Fields Updated
    /// - `name`, `category`, `unit`
    /// - `available`: hidden products cannot be ordered
    fn on_update(&mut self, patch: ProductPatch) -> Result<(), String> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(available) = patch.available {
            self.available = available;
        }
        Ok(())
    }

    fn handle_action(&mut self, action: ProductAction) -> Result<ProductActionResult, String> {
        match action {
            ProductAction::Reprice { variant, price } => {
                if price < Decimal::ZERO {
                    return Err(format!("negative price: {price}"));
                }
                let slot = match variant {
                    None => &mut self.base_price,
                    Some(name) => match self.variants.iter_mut().find(|v| v.name == name) {
                        Some(variant) => &mut variant.price,
                        None => return Err(format!("unknown variant: {name}")),
                    },
                };
                Ok(ProductActionResult::Reprice(std::mem::replace(slot, price)))
            }
        }
    }
}
