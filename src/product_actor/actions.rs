use rust_decimal::Decimal;

/// Custom actions for Product records.
#[derive(Debug, Clone)]
pub enum ProductAction {
    /// Change the base price (`variant: None`) or the price of a named variant.
    ///
    /// # Errors
    /// Fails if the named variant does not exist or the price is negative.
    Reprice {
        variant: Option<String>,
        price: Decimal,
    },
}

/// Results from ProductActions - variants match 1:1 with ProductAction
#[derive(Debug, Clone, PartialEq)]
pub enum ProductActionResult {
    /// The price that was replaced.
    Reprice(Decimal),
}
