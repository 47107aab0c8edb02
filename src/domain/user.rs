use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer account and its loyalty wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider uid.
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub wallet_points: u64,
    pub is_first_order_completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile handed over at sign-up.
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Payload for creating a new user: the profile stamped by the client.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub profile: UserCreate,
    pub created_at: DateTime<Utc>,
}

impl UserCreate {
    /// # Arguments
    /// * `id` - uid handed out by the identity provider
    /// * `name` - display name
    /// * `email` - contact email
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            address: String::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// Payload for updating profile fields. The wallet is not patchable.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
