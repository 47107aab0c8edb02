//! Catalog records: base prices, cut variants and availability.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;
