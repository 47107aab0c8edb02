//! Order records: the status pipeline and the per-order ledger flags.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;
