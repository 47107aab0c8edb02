use chrono::FixedOffset;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::actor_framework::{ResourceClient, Subscription};
use crate::clients::WalletLedger;
use crate::clock::Clock;
use crate::domain::{
    sort_newest_first, Order, OrderCreate, OrderDraft, OrderPatch, OrderReceipt, OrderStatus,
};
use crate::order_actor::{
    CancelOutcome, ConfirmOutcome, LedgerClaim, LedgerEntry, OrderAction, OrderActionResult,
    OrderError, TransitionOutcome,
};

/// Durable record of every order, plus the ledger plumbing that ties order
/// events to wallet movements.
///
/// # Ledger protocol
/// A wallet movement for an order is first claimed on the order record, which
/// marks it in flight without setting its flag. The wallet is then moved with
/// an atomic increment. Success confirms the claim and sets the flag; failure
/// releases it and leaves the order due again for the reconciliation sweep.
/// Only a confirmed debit is ever refunded, and a release can never clear a
/// confirmed flag.
#[derive(Clone)]
pub struct OrderStore {
    inner: ResourceClient<Order>,
    wallet: WalletLedger,
    clock: Arc<dyn Clock>,
    business_offset: FixedOffset,
}

impl OrderStore {
    pub fn new(
        inner: ResourceClient<Order>,
        wallet: WalletLedger,
        clock: Arc<dyn Clock>,
        business_offset: FixedOffset,
    ) -> Self {
        Self {
            inner,
            wallet,
            clock,
            business_offset,
        }
    }

    /// Number and persist a new pending order in one write.
    ///
    /// The receipt comes from the commit reply itself, with no read-back that
    /// could fail after the order is already written.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id))]
    pub async fn create(&self, draft: OrderDraft) -> Result<OrderReceipt, OrderError> {
        let created_at = self.clock.now();
        let business_date = created_at.with_timezone(&self.business_offset).date_naive();

        let order = self
            .inner
            .create(OrderCreate {
                draft,
                created_at,
                business_date,
            })
            .await?;

        info!(order_id = %order.id, display_id = %order.display_id, "Order created");
        Ok(OrderReceipt {
            id: order.id,
            display_id: order.display_id,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Order, OrderError> {
        debug!("Sending request");
        self.inner
            .get(id.to_string())
            .await?
            .ok_or_else(|| OrderError::NotFound(id.to_string()))
    }

    /// Operator path: refuses illegal moves loudly.
    ///
    /// Returns `Ok(None)` if the order no longer exists.
    ///
    /// # Errors
    /// `InvalidTransition` for terminal orders, backward moves, or a
    /// cancellation that did not go through [`OrderStore::cancel`].
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: &str,
        to: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, OrderError> {
        match self.transition(id, to).await? {
            Some(TransitionOutcome::Rejected { from, to }) => {
                Err(OrderError::InvalidTransition { from, to })
            }
            outcome => Ok(outcome),
        }
    }

    /// Background path used by the simulator and the delivery board.
    ///
    /// Same guard and same credit as [`OrderStore::update_status`], but a
    /// refused move is logged and reported as an outcome instead of an error.
    #[instrument(skip(self))]
    pub async fn advance_if_not_terminal(
        &self,
        id: &str,
        to: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, OrderError> {
        let outcome = self.transition(id, to).await?;
        if let Some(TransitionOutcome::Rejected { from, to }) = &outcome {
            warn!(%from, %to, "Ignoring transition");
        }
        Ok(outcome)
    }

    async fn transition(
        &self,
        id: &str,
        to: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, OrderError> {
        let outcome = match self
            .inner
            .perform_action(id.to_string(), OrderAction::Transition(to))
            .await
            .map_err(OrderError::from)
        {
            Ok(OrderActionResult::Transition(outcome)) => outcome,
            Ok(other) => return Err(unexpected(other)),
            Err(OrderError::NotFound(_)) => {
                warn!("Order no longer exists");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if let TransitionOutcome::Applied {
            from,
            to,
            credit: Some(claim),
        } = &outcome
        {
            info!(%from, %to, points = claim.points, "Order delivered, crediting points");
            // The status change is committed; a failed credit is left to the sweep.
            if let Err(e) = self.apply_claim(claim).await {
                error!(error = %e, "Credit failed, left for reconciliation");
            }
        }
        Ok(Some(outcome))
    }

    /// `pending -> cancelled`, refunding any redemption already taken.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<CancelOutcome, OrderError> {
        let outcome = match self
            .inner
            .perform_action(id.to_string(), OrderAction::Cancel)
            .await?
        {
            OrderActionResult::Cancel(outcome) => outcome,
            other => return Err(unexpected(other)),
        };

        match &outcome {
            CancelOutcome::Cancelled {
                refund: Some(claim),
            } => {
                info!(points = claim.points, "Order cancelled, refunding points");
                if let Err(e) = self.apply_claim(claim).await {
                    error!(error = %e, "Refund failed, left for reconciliation");
                }
            }
            CancelOutcome::Cancelled { refund: None } => info!("Order cancelled"),
            CancelOutcome::NotCancellable(status) => {
                warn!(%status, "Order can no longer be cancelled")
            }
        }
        Ok(outcome)
    }

    /// Reserve a ledger entry on the order if it is due and not yet taken.
    #[instrument(skip(self))]
    async fn claim(&self, id: &str, entry: LedgerEntry) -> Result<Option<LedgerClaim>, OrderError> {
        match self
            .inner
            .perform_action(id.to_string(), OrderAction::Claim(entry))
            .await?
        {
            OrderActionResult::Claim(claim) => Ok(claim),
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self))]
    async fn confirm(&self, id: &str, entry: LedgerEntry) -> Result<ConfirmOutcome, OrderError> {
        match self
            .inner
            .perform_action(id.to_string(), OrderAction::Confirm(entry))
            .await?
        {
            OrderActionResult::Confirm(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    /// Hand back an outstanding claim whose wallet step failed.
    #[instrument(skip(self))]
    async fn release(&self, id: &str, entry: LedgerEntry) -> Result<bool, OrderError> {
        match self
            .inner
            .perform_action(id.to_string(), OrderAction::Release(entry))
            .await?
        {
            OrderActionResult::Release(released) => Ok(released),
            other => Err(unexpected(other)),
        }
    }

    /// Move the claimed points, then any entry the confirmation made due.
    /// Returns the balance after the first movement.
    ///
    /// On failure of the first movement its claim is released before the
    /// error is returned.
    async fn apply_claim(&self, claim: &LedgerClaim) -> Result<u64, OrderError> {
        let (balance, mut follow_up) = self.apply_once(claim).await?;
        while let Some(next) = follow_up.take() {
            info!(order_id = %next.order_id, entry = ?next.entry, "Applying follow-up entry");
            match self.apply_once(&next).await {
                Ok((_, after)) => follow_up = after,
                Err(e) => error!(error = %e, "Follow-up entry failed, left for reconciliation"),
            }
        }
        Ok(balance)
    }

    #[instrument(skip(self, claim), fields(order_id = %claim.order_id, entry = ?claim.entry))]
    async fn apply_once(
        &self,
        claim: &LedgerClaim,
    ) -> Result<(u64, Option<LedgerClaim>), OrderError> {
        let balance = match self.wallet.increment(&claim.user_id, claim.delta()).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Wallet step failed, releasing claim");
                if let Err(release_error) = self.release(&claim.order_id, claim.entry).await {
                    error!(error = %release_error, "Could not release claim");
                }
                return Err(OrderError::Wallet(e));
            }
        };
        debug!(balance, "Ledger entry applied");

        // The points have moved; an unconfirmed claim stays in flight and is never re-applied
        let follow_up = match self.confirm(&claim.order_id, claim.entry).await {
            Ok(ConfirmOutcome::Confirmed { follow_up }) => follow_up,
            Ok(ConfirmOutcome::NotOutstanding) => {
                warn!("Applied entry had no outstanding claim");
                None
            }
            Err(e) => {
                error!(error = %e, "Could not confirm applied entry");
                None
            }
        };
        Ok((balance, follow_up))
    }

    /// Claim and apply in one go. `Ok(None)` when the entry was not due.
    pub async fn settle(&self, id: &str, entry: LedgerEntry) -> Result<Option<u64>, OrderError> {
        match self.claim(id, entry).await? {
            Some(claim) => self.apply_claim(&claim).await.map(Some),
            None => Ok(None),
        }
    }

    /// Status write from outside the ledger, as a second writer to the store would make it.
    #[cfg(test)]
    pub(crate) async fn force_status(&self, id: &str, status: OrderStatus) -> Result<(), OrderError> {
        match self
            .inner
            .perform_action(id.to_string(), OrderAction::ForceStatus(status))
            .await?
        {
            OrderActionResult::ForceStatus => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Address, estimate and note, until the order is out for delivery.
    #[instrument(skip(self, patch))]
    pub async fn edit_details(&self, id: &str, patch: OrderPatch) -> Result<Order, OrderError> {
        debug!("Sending request");
        Ok(self.inner.update(id.to_string(), patch).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        let owner = user_id.to_string();
        let mut orders = self
            .inner
            .query(move |order: &Order| order.user_id == owner)
            .await?;
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    /// The user's full order set, newest first, again after every change to it.
    #[instrument(skip(self))]
    pub async fn subscribe_for_user(&self, user_id: &str) -> Result<OrderFeed, OrderError> {
        let owner = user_id.to_string();
        let subscription = self
            .inner
            .subscribe(move |order: &Order| order.user_id == owner)
            .await?;
        Ok(OrderFeed { subscription })
    }

    #[instrument(skip(self))]
    pub async fn subscribe_by_status(&self, status: OrderStatus) -> Result<OrderFeed, OrderError> {
        let subscription = self
            .inner
            .subscribe(move |order: &Order| order.status == status)
            .await?;
        Ok(OrderFeed { subscription })
    }

    pub async fn shutdown(&self) -> Result<(), OrderError> {
        Ok(self.inner.shutdown().await?)
    }
}

fn unexpected(result: OrderActionResult) -> OrderError {
    OrderError::StoreUnavailable(format!("unexpected result: {:?}", result))
}

/// Live order snapshots, sorted newest first.
#[derive(Debug)]
pub struct OrderFeed {
    subscription: Subscription<Order>,
}

impl OrderFeed {
    /// `None` once the store stops.
    pub async fn next(&mut self) -> Option<Vec<Order>> {
        let mut orders = self.subscription.next().await?;
        sort_newest_first(&mut orders);
        Some(orders)
    }

    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}
