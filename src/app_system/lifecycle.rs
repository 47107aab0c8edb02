use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::clients::{CatalogClient, OrderStore, UserClient, WalletLedger};
use crate::config::RetryPolicy;
use crate::domain::{
    resolve_price, Order, OrderDraft, OrderItem, OrderReceipt, OrderStatus, PricingPolicy, User,
    UserPatch,
};
use crate::order_actor::{CancelOutcome, LedgerEntry, OrderError, TransitionOutcome};
use crate::product_actor::ProductError;
use crate::user_actor::UserError;

/// One line of the customer's cart, before pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
    pub weight: Decimal,
    /// Variant name; falls back to the base price if the product has no such variant.
    pub cutting_type: Option<String>,
}

/// Everything checkout hands over.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub user_id: String,
    pub lines: Vec<CartLine>,
    pub address: String,
    pub delivery_estimate: Option<String>,
    pub redeem_points: u64,
    pub note: Option<String>,
}

/// Rules connecting orders to wallets. Holds no state of its own.
#[derive(Clone)]
pub struct LifecycleController {
    users: UserClient,
    wallet: WalletLedger,
    catalog: CatalogClient,
    orders: OrderStore,
    pricing: PricingPolicy,
    retry: RetryPolicy,
}

impl LifecycleController {
    pub fn new(
        users: UserClient,
        catalog: CatalogClient,
        orders: OrderStore,
        pricing: PricingPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            wallet: users.wallet(),
            users,
            catalog,
            orders,
            pricing,
            retry,
        }
    }

    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    /// Price the cart, write the order, then take the redeemed points.
    ///
    /// All preconditions are checked before anything is written. Once the
    /// order is committed, the debit, the first-order flag and the profile
    /// address are best effort: failures are logged and left for the sweep.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.lines.len()))]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<OrderReceipt, OrderError> {
        info!("Processing place_order request");

        if request.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let user = match self.users.get_user(&request.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                error!("User not found");
                return Err(OrderError::InvalidUser(request.user_id.clone()));
            }
            Err(e) => {
                error!(error = %e, "User lookup failed");
                return Err(e.into());
            }
        };

        if request.redeem_points > user.wallet_points {
            warn!(
                requested = request.redeem_points,
                available = user.wallet_points,
                "Redemption exceeds balance"
            );
            return Err(OrderError::InsufficientPoints {
                requested: request.redeem_points,
                available: user.wallet_points,
            });
        }

        let items = self.price_lines(&request.lines).await?;
        let first_order = !user.is_first_order_completed;
        let quote = self
            .pricing
            .quote(&items, first_order, request.redeem_points);
        if quote.final_amount < Decimal::ZERO {
            return Err(OrderError::ValidationError(format!(
                "redemption exceeds the amount due: {}",
                quote.final_amount
            )));
        }

        let draft = OrderDraft {
            user_id: request.user_id.clone(),
            items,
            total_amount: quote.total_amount,
            discount: quote.discount,
            wallet_used: quote.wallet_used,
            delivery_charge: quote.delivery_charge,
            final_amount: quote.final_amount,
            earned_points: quote.earned_points,
            address: request.address.clone(),
            delivery_estimate: request.delivery_estimate,
            note: request.note,
        };
        let receipt = self.create_with_retry(draft).await?;

        self.after_commit(&receipt, &user, first_order, request.redeem_points, &request.address)
            .await;

        info!(order_id = %receipt.id, display_id = %receipt.display_id, "Order placed");
        Ok(receipt)
    }

    async fn price_lines(&self, lines: &[CartLine]) -> Result<Vec<OrderItem>, OrderError> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 || line.weight <= Decimal::ZERO {
                return Err(OrderError::ValidationError(format!(
                    "invalid quantity or weight for {}",
                    line.product_id
                )));
            }

            let product = match self.catalog.get_product(&line.product_id).await {
                Ok(Some(product)) if product.available => product,
                Ok(_) => {
                    error!(product_id = %line.product_id, "Product not orderable");
                    return Err(OrderError::InvalidProduct(line.product_id.clone()));
                }
                Err(ProductError::StoreUnavailable(reason)) => {
                    return Err(OrderError::StoreUnavailable(reason))
                }
                Err(e) => {
                    error!(error = %e, "Product validation failed");
                    return Err(OrderError::InvalidProduct(line.product_id.clone()));
                }
            };

            items.push(OrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                quantity: line.quantity,
                weight: line.weight,
                unit_price: resolve_price(&product, line.cutting_type.as_deref()),
                cutting_type: line.cutting_type.clone(),
            });
        }
        Ok(items)
    }

    async fn create_with_retry(&self, draft: OrderDraft) -> Result<OrderReceipt, OrderError> {
        let mut backoff = self.retry.backoff;
        let mut attempt = 1;
        loop {
            match self.orders.create(draft.clone()).await {
                Err(e) if e.is_retriable() && attempt < self.retry.attempts => {
                    warn!(attempt, error = %e, "Order transaction conflicted, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn after_commit(
        &self,
        receipt: &OrderReceipt,
        user: &User,
        first_order: bool,
        redeem_points: u64,
        address: &str,
    ) {
        if redeem_points > 0 {
            if let Err(e) = self.orders.settle(&receipt.id, LedgerEntry::Debit).await {
                error!(order_id = %receipt.id, error = %e, "Point deduction failed, left for reconciliation");
            }
        }

        if first_order {
            if let Err(e) = self.users.complete_first_order(&user.id).await {
                error!(error = %e, "Could not mark first order completed");
            }
        }

        if !address.is_empty() && address != user.address {
            let patch = UserPatch {
                address: Some(address.to_string()),
                ..Default::default()
            };
            if let Err(e) = self.users.update_profile(&user.id, patch).await {
                warn!(error = %e, "Could not save delivery address to profile");
            }
        }
    }

    /// Customer-initiated cancellation, only while the order is pending.
    ///
    /// # Errors
    /// `InvalidTransition` if the order already moved on.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), OrderError> {
        match self.orders.cancel(order_id).await? {
            CancelOutcome::Cancelled { .. } => Ok(()),
            CancelOutcome::NotCancellable(from) => Err(OrderError::InvalidTransition {
                from,
                to: OrderStatus::Cancelled,
            }),
        }
    }

    /// Credit a delivered order's points if nobody has yet.
    ///
    /// Returns the new balance when this call did the credit.
    #[instrument(skip(self))]
    pub async fn reconcile_points(&self, order_id: &str) -> Result<Option<u64>, OrderError> {
        let applied = self.orders.settle(order_id, LedgerEntry::Credit).await?;
        if let Some(balance) = applied {
            info!(balance, "Repaired missing credit");
        }
        Ok(applied)
    }

    /// Settle whichever ledger entries this order still owes.
    ///
    /// Returns the entries this call applied.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reconcile_order(&self, order: &Order) -> Result<Vec<LedgerEntry>, OrderError> {
        let mut applied = Vec::new();
        for entry in due_entries(order) {
            if self.orders.settle(&order.id, entry).await?.is_some() {
                info!(?entry, "Repaired ledger entry");
                applied.push(entry);
            }
        }
        Ok(applied)
    }

    /// Flip the first-order flag for a user who has orders but never got it.
    pub async fn ensure_first_order_flag(&self, user_id: &str) -> Result<bool, UserError> {
        let flipped = self.users.complete_first_order(user_id).await?;
        if flipped {
            info!(user_id, "Repaired first-order flag");
        }
        Ok(flipped)
    }

    /// Guarded advance for background callers.
    pub async fn advance_status(
        &self,
        order_id: &str,
        to: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, OrderError> {
        self.orders.advance_if_not_terminal(order_id, to).await
    }

    pub async fn balance(&self, user_id: &str) -> Result<u64, UserError> {
        self.wallet.get_balance(user_id).await
    }
}

/// Longest wait between two order-creation attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

fn next_backoff(backoff: Duration) -> Duration {
    backoff.saturating_mul(2).min(MAX_BACKOFF.max(backoff))
}

/// Ledger entries an order is owed, as read from its flags.
pub fn due_entries(order: &Order) -> Vec<LedgerEntry> {
    let mut due = Vec::new();
    if order.needs_debit() {
        due.push(LedgerEntry::Debit);
    }
    if order.needs_refund() {
        due.push(LedgerEntry::Refund);
    }
    if order.needs_credit() {
        due.push(LedgerEntry::Credit);
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_system::OrderSystem;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::domain::{Product, UserCreate};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;

    struct Shop {
        system: OrderSystem,
        clock: ManualClock,
        chicken: String,
        mutton: String,
    }

    async fn shop() -> Shop {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 4, 0, 0).unwrap());
        let system = OrderSystem::with_clock(AppConfig::default(), Arc::new(clock.clone()));

        system
            .users
            .create_user(UserCreate::new("uid_1", "Asha", "asha@example.com").with_address("12 MG Road"))
            .await
            .unwrap();
        let chicken = system
            .catalog
            .create_product(Product::new("", "Chicken", Decimal::from(250), "kg").into())
            .await
            .unwrap();
        let mutton = system
            .catalog
            .create_product(
                Product::new("", "Mutton", Decimal::from(500), "kg")
                    .with_variant("Curry Cut", Decimal::from(520))
                    .into(),
            )
            .await
            .unwrap();

        Shop {
            system,
            clock,
            chicken,
            mutton,
        }
    }

    fn line(product_id: &str, quantity: u32, weight: Decimal) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            quantity,
            weight,
            cutting_type: None,
        }
    }

    fn request(lines: Vec<CartLine>, redeem_points: u64) -> PlaceOrder {
        PlaceOrder {
            user_id: "uid_1".to_string(),
            lines,
            address: "12 MG Road".to_string(),
            delivery_estimate: Some("35 min".to_string()),
            redeem_points,
            note: None,
        }
    }

    #[tokio::test]
    async fn first_order_with_redemption() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        shop.system.wallet.increment("uid_1", 150).await.unwrap();

        let receipt = lifecycle
            .place_order(request(vec![line(&shop.mutton, 2, Decimal::ONE)], 100))
            .await
            .unwrap();

        let order = shop.system.orders.get_by_id(&receipt.id).await.unwrap();
        assert_eq!(order.total_amount, Decimal::from(1000));
        assert_eq!(order.discount, Decimal::from(100));
        assert_eq!(order.final_amount, Decimal::from(800));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.wallet_debited);

        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 50);
        let user = shop.system.users.require_user("uid_1").await.unwrap();
        assert!(user.is_first_order_completed);
    }

    #[tokio::test]
    async fn second_order_pays_full_price() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0))
            .await
            .unwrap();
        let second = lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0))
            .await
            .unwrap();

        let order = shop.system.orders.get_by_id(&second.id).await.unwrap();
        assert_eq!(order.discount, Decimal::ZERO);
        assert_eq!(order.final_amount, Decimal::from(250));
    }

    #[tokio::test]
    async fn walking_the_pipeline_credits_exactly_once() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let receipt = lifecycle
            .place_order(request(vec![line(&shop.chicken, 12, Decimal::ONE)], 0))
            .await
            .unwrap();

        let mut status = OrderStatus::Pending;
        for _ in 0..7 {
            let next = status.next().unwrap_or(status);
            lifecycle.advance_status(&receipt.id, next).await.unwrap();
            status = next;
        }

        let order = shop.system.orders.get_by_id(&receipt.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.points_credited);
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn terminal_orders_are_never_resurrected() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let cancelled = lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0))
            .await
            .unwrap();
        lifecycle.cancel_order(&cancelled.id).await.unwrap();
        let delivered = lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0))
            .await
            .unwrap();
        lifecycle
            .advance_status(&delivered.id, OrderStatus::Delivered)
            .await
            .unwrap();

        for status in OrderStatus::PIPELINE.iter().chain([OrderStatus::Cancelled].iter()) {
            lifecycle.advance_status(&cancelled.id, *status).await.unwrap();
            lifecycle.advance_status(&delivered.id, *status).await.unwrap();
        }

        let orders = &shop.system.orders;
        assert_eq!(
            orders.get_by_id(&cancelled.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
        assert_eq!(
            orders.get_by_id(&delivered.id).await.unwrap().status,
            OrderStatus::Delivered
        );
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_orders_get_distinct_sequence_numbers() {
        let shop = shop().await;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = shop.system.lifecycle.clone();
                let chicken = shop.chicken.clone();
                tokio::spawn(async move {
                    lifecycle
                        .place_order(request(vec![line(&chicken, 1, Decimal::ONE)], 0))
                        .await
                })
            })
            .collect();

        let mut display_ids = HashSet::new();
        for task in tasks {
            display_ids.insert(task.await.unwrap().unwrap().display_id);
        }
        let expected: HashSet<String> = (1..=8).map(|n| format!("MU-150625-{:02}", n)).collect();
        assert_eq!(display_ids, expected);
    }

    #[tokio::test]
    async fn numbering_restarts_the_next_day() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let cart = || request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0);

        let first = lifecycle.place_order(cart()).await.unwrap();
        let second = lifecycle.place_order(cart()).await.unwrap();
        shop.clock.advance(chrono::Duration::days(1));
        let third = lifecycle.place_order(cart()).await.unwrap();

        assert_eq!(first.display_id, "MU-150625-01");
        assert_eq!(second.display_id, "MU-150625-02");
        assert_eq!(third.display_id, "MU-160625-01");
    }

    #[tokio::test]
    async fn over_redemption_writes_nothing() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        shop.system.wallet.increment("uid_1", 20).await.unwrap();

        let result = lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 21))
            .await;
        assert_eq!(
            result,
            Err(OrderError::InsufficientPoints {
                requested: 21,
                available: 20
            })
        );
        assert!(shop.system.orders.list_for_user("uid_1").await.unwrap().is_empty());
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn cancellation_restores_redeemed_points() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        shop.system.wallet.increment("uid_1", 120).await.unwrap();

        let receipt = lifecycle
            .place_order(request(vec![line(&shop.mutton, 1, Decimal::ONE)], 80))
            .await
            .unwrap();
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 40);

        lifecycle.cancel_order(&receipt.id).await.unwrap();
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 120);

        assert_eq!(
            lifecycle.cancel_order(&receipt.id).await,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled
            })
        );
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 120);
    }

    #[tokio::test]
    async fn confirmed_orders_cannot_be_cancelled() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let receipt = lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0))
            .await
            .unwrap();
        lifecycle
            .advance_status(&receipt.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        assert!(matches!(
            lifecycle.cancel_order(&receipt.id).await,
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn later_price_changes_leave_orders_alone() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let mut cart = request(vec![line(&shop.mutton, 1, Decimal::new(5, 1))], 0);
        cart.lines[0].cutting_type = Some("Curry Cut".to_string());

        let receipt = lifecycle.place_order(cart).await.unwrap();
        let before = shop.system.orders.get_by_id(&receipt.id).await.unwrap();
        assert_eq!(before.items[0].unit_price, Decimal::from(520));
        assert_eq!(before.total_amount, Decimal::from(260));

        shop.system
            .catalog
            .reprice(&shop.mutton, Some("Curry Cut"), Decimal::from(600))
            .await
            .unwrap();
        shop.system
            .catalog
            .reprice(&shop.mutton, None, Decimal::from(550))
            .await
            .unwrap();

        let after = shop.system.orders.get_by_id(&receipt.id).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn unknown_variant_falls_back_to_base_price() {
        let shop = shop().await;
        let mut cart = request(vec![line(&shop.mutton, 1, Decimal::ONE)], 0);
        cart.lines[0].cutting_type = Some("Keema".to_string());

        let receipt = shop.system.lifecycle.place_order(cart).await.unwrap();
        let order = shop.system.orders.get_by_id(&receipt.id).await.unwrap();
        assert_eq!(order.items[0].unit_price, Decimal::from(500));
        assert_eq!(order.items[0].cutting_type.as_deref(), Some("Keema"));
    }

    #[tokio::test]
    async fn rejects_bad_carts_before_writing() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;

        assert_eq!(
            lifecycle.place_order(request(Vec::new(), 0)).await,
            Err(OrderError::EmptyCart)
        );
        assert_eq!(
            lifecycle
                .place_order(request(vec![line("ghost", 1, Decimal::ONE)], 0))
                .await,
            Err(OrderError::InvalidProduct("ghost".to_string()))
        );
        assert!(matches!(
            lifecycle
                .place_order(request(vec![line(&shop.chicken, 0, Decimal::ONE)], 0))
                .await,
            Err(OrderError::ValidationError(_))
        ));

        let mut stranger = request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0);
        stranger.user_id = "nobody".to_string();
        assert_eq!(
            lifecycle.place_order(stranger).await,
            Err(OrderError::InvalidUser("nobody".to_string()))
        );

        assert!(shop.system.orders.list_for_user("uid_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redemption_cannot_exceed_amount_due() {
        let shop = shop().await;
        shop.system.wallet.increment("uid_1", 1000).await.unwrap();
        let result = shop
            .system
            .lifecycle
            .place_order(request(vec![line(&shop.chicken, 1, Decimal::ONE)], 300))
            .await;
        assert!(matches!(result, Err(OrderError::ValidationError(_))));
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 1000);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        assert_eq!(
            next_backoff(Duration::from_millis(5)),
            Duration::from_millis(10)
        );
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_BACKOFF);
        // a configured wait above the cap is kept, never grown
        assert_eq!(
            next_backoff(Duration::from_secs(45)),
            Duration::from_secs(45)
        );
        assert_eq!(next_backoff(Duration::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn new_delivery_address_is_saved_to_profile() {
        let shop = shop().await;
        let mut cart = request(vec![line(&shop.chicken, 1, Decimal::ONE)], 0);
        cart.address = "7 Brigade Road".to_string();
        shop.system.lifecycle.place_order(cart).await.unwrap();

        let user = shop.system.users.require_user("uid_1").await.unwrap();
        assert_eq!(user.address, "7 Brigade Road");
    }

    #[tokio::test]
    async fn reconcile_repairs_an_uncredited_delivery() {
        let shop = shop().await;
        let lifecycle = &shop.system.lifecycle;
        let receipt = lifecycle
            .place_order(request(vec![line(&shop.chicken, 3, Decimal::ONE)], 0))
            .await
            .unwrap();

        // another writer delivered it without paying out
        shop.system
            .orders
            .force_status(&receipt.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 0);

        assert_eq!(lifecycle.reconcile_points(&receipt.id).await.unwrap(), Some(3));
        assert_eq!(lifecycle.reconcile_points(&receipt.id).await.unwrap(), None);
        assert_eq!(shop.system.wallet.get_balance("uid_1").await.unwrap(), 3);
    }
}
