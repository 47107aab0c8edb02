use std::sync::Arc;
use tracing::{debug, instrument};

use crate::actor_framework::ResourceClient;
use crate::clients::WalletLedger;
use crate::clock::{Clock, SystemClock};
use crate::domain::{SignUp, User, UserCreate, UserPatch};
use crate::user_actor::{UserAction, UserActionResult, UserError};

/// Client for the profile side of User records.
#[derive(Clone)]
pub struct UserClient {
    inner: ResourceClient<User>,
    clock: Arc<dyn Clock>,
}

crate::impl_client_methods!(UserClient, User, UserError, user);

impl UserClient {
    pub fn new(inner: ResourceClient<User>) -> Self {
        Self {
            inner,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp sign-ups with `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sign-up: the id comes from the identity provider, the wallet starts at zero.
    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    pub async fn create_user(&self, profile: UserCreate) -> Result<String, UserError> {
        debug!("Sending request");
        self.inner
            .create(SignUp {
                profile,
                created_at: self.clock.now(),
            })
            .await
            .map(|created| created.id)
            .map_err(UserError::from)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, id: &str, patch: UserPatch) -> Result<User, UserError> {
        debug!("Sending request");
        self.inner
            .update(id.to_string(), patch)
            .await
            .map_err(UserError::from)
    }

    /// Returns `true` if this call flipped the flag.
    #[instrument(skip(self))]
    pub async fn complete_first_order(&self, id: &str) -> Result<bool, UserError> {
        debug!("Sending request");
        match self
            .inner
            .perform_action(id.to_string(), UserAction::CompleteFirstOrder)
            .await?
        {
            UserActionResult::CompleteFirstOrder(flipped) => Ok(flipped),
            other => Err(UserError::StoreUnavailable(format!(
                "unexpected result: {:?}",
                other
            ))),
        }
    }

    /// The wallet view over the same records.
    pub fn wallet(&self) -> WalletLedger {
        WalletLedger::new(self.inner.clone())
    }
}
