use tracing::{debug, info, instrument};

use crate::actor_framework::{ResourceClient, Subscription};
use crate::domain::User;
use crate::user_actor::{PointsAdjustment, UserAction, UserActionResult, UserError};

/// The loyalty-points balance of each user.
///
/// Every movement goes through [`WalletLedger::increment`], an atomic delta
/// applied inside the user's record, so concurrent credits and redemptions
/// cannot lose each other.
#[derive(Clone)]
pub struct WalletLedger {
    inner: ResourceClient<User>,
}

impl WalletLedger {
    pub fn new(inner: ResourceClient<User>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: &str) -> Result<u64, UserError> {
        debug!("Sending request");
        self.inner
            .get(user_id.to_string())
            .await?
            .map(|user| user.wallet_points)
            .ok_or_else(|| UserError::NotFound(user_id.to_string()))
    }

    /// Absolute write. Only for administrative corrections; order flows use `increment`.
    #[instrument(skip(self))]
    pub async fn set_balance(&self, user_id: &str, points: u64) -> Result<u64, UserError> {
        info!("Overwriting wallet balance");
        match self
            .inner
            .perform_action(user_id.to_string(), UserAction::SetPoints(points))
            .await?
        {
            UserActionResult::SetPoints(balance) => Ok(balance),
            other => Err(unexpected(other)),
        }
    }

    /// Apply a signed delta and return the new balance.
    ///
    /// # Errors
    /// `InsufficientPoints` when a negative delta exceeds the balance; nothing is written.
    #[instrument(skip(self))]
    pub async fn increment(&self, user_id: &str, delta: i64) -> Result<u64, UserError> {
        debug!("Sending request");
        match self
            .inner
            .perform_action(user_id.to_string(), UserAction::AdjustPoints(delta))
            .await?
        {
            UserActionResult::AdjustPoints(PointsAdjustment::Applied { balance }) => Ok(balance),
            UserActionResult::AdjustPoints(PointsAdjustment::Insufficient {
                requested,
                available,
            }) => Err(UserError::InsufficientPoints {
                requested,
                available,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Live balance of one user. The current value arrives first.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, user_id: &str) -> Result<BalanceFeed, UserError> {
        let id = user_id.to_string();
        let subscription = self
            .inner
            .subscribe(move |user: &User| user.id == id)
            .await?;
        Ok(BalanceFeed {
            subscription,
            last: None,
        })
    }
}

fn unexpected(result: UserActionResult) -> UserError {
    UserError::StoreUnavailable(format!("unexpected result: {:?}", result))
}

/// Balance updates with repeats dropped.
#[derive(Debug)]
pub struct BalanceFeed {
    subscription: Subscription<User>,
    last: Option<u64>,
}

impl BalanceFeed {
    /// The next distinct balance, or `None` once the store stops.
    pub async fn next(&mut self) -> Option<u64> {
        loop {
            let snapshot = self.subscription.next().await?;
            let Some(balance) = snapshot.first().map(|user| user.wallet_points) else {
                continue;
            };
            if self.last != Some(balance) {
                self.last = Some(balance);
                return Some(balance);
            }
        }
    }

    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}
