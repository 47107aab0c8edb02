//! Typed clients over the resource actors.

#[macro_use]
mod macros;

pub mod catalog_client;
pub mod order_store;
pub mod user_client;
pub mod wallet_ledger;

pub use catalog_client::*;
pub use order_store::*;
pub use user_client::*;
pub use wallet_ledger::*;
