//! User records: profile fields, the loyalty wallet and the first-order flag.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;
