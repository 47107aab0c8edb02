use thiserror::Error;

use crate::actor_framework::FrameworkError;
use crate::domain::OrderStatus;
use crate::user_actor::UserError;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),
    #[error("Invalid user: {0}")]
    InvalidUser(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: u64, available: u64 },
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order validation error: {0}")]
    ValidationError(String),
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
    #[error("Order store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Wallet error: {0}")]
    Wallet(#[from] UserError),
}

impl OrderError {
    /// Only contention on the store's transaction is worth retrying blindly.
    pub fn is_retriable(&self) -> bool {
        matches!(self, OrderError::TransactionConflict(_))
    }
}

impl From<FrameworkError> for OrderError {
    fn from(error: FrameworkError) -> Self {
        match error {
            FrameworkError::NotFound(id) => OrderError::NotFound(id),
            FrameworkError::AlreadyExists(id) => {
                OrderError::ValidationError(format!("order already exists: {id}"))
            }
            FrameworkError::Rejected(reason) => OrderError::ValidationError(reason),
            FrameworkError::Conflict(reason) => OrderError::TransactionConflict(reason),
            unavailable @ (FrameworkError::ActorClosed | FrameworkError::ActorDropped) => {
                OrderError::StoreUnavailable(unavailable.to_string())
            }
        }
    }
}
