pub mod order;
pub mod pricing;
pub mod product;
pub mod sequence;
pub mod user;

pub use order::*;
pub use pricing::*;
pub use product::*;
pub use sequence::*;
pub use user::*;
