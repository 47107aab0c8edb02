use tracing::{info, instrument};

use crate::clients::{OrderFeed, OrderStore};
use crate::domain::OrderStatus;
use crate::order_actor::{OrderError, TransitionOutcome};

/// What the delivery staff app sees: every order on the road.
///
/// Any delivery session may act on any order out for delivery.
#[derive(Clone)]
pub struct DeliveryBoard {
    orders: OrderStore,
}

impl DeliveryBoard {
    pub fn new(orders: OrderStore) -> Self {
        Self { orders }
    }

    /// Orders currently out for delivery, newest first.
    pub async fn feed(&self) -> Result<OrderFeed, OrderError> {
        self.orders
            .subscribe_by_status(OrderStatus::OutForDelivery)
            .await
    }

    /// Hand-over at the door. Goes through the guarded advance, so a
    /// cancelled or already delivered order is left as it is.
    ///
    /// # Errors
    /// `NotFound` if the order is gone; the row shows the error inline.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: &str) -> Result<TransitionOutcome, OrderError> {
        let outcome = self
            .orders
            .advance_if_not_terminal(order_id, OrderStatus::Delivered)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if let TransitionOutcome::Applied { .. } = outcome {
            info!("Order marked delivered");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_system::{CartLine, OrderSystem, PlaceOrder};
    use crate::config::AppConfig;
    use crate::domain::{Product, UserCreate};
    use rust_decimal::Decimal;

    async fn dispatched_order(system: &OrderSystem) -> String {
        system
            .users
            .create_user(UserCreate::new("uid_1", "Asha", "asha@example.com"))
            .await
            .unwrap();
        let product = system
            .catalog
            .create_product(Product::new("", "Crab", Decimal::from(900), "kg").into())
            .await
            .unwrap();
        let receipt = system
            .lifecycle
            .place_order(PlaceOrder {
                user_id: "uid_1".to_string(),
                lines: vec![CartLine {
                    product_id: product,
                    quantity: 1,
                    weight: Decimal::new(25, 1),
                    cutting_type: None,
                }],
                address: String::new(),
                delivery_estimate: None,
                redeem_points: 0,
                note: None,
            })
            .await
            .unwrap();
        system
            .orders
            .advance_if_not_terminal(&receipt.id, OrderStatus::OutForDelivery)
            .await
            .unwrap();
        receipt.id
    }

    #[tokio::test]
    async fn delivered_orders_leave_the_board() {
        let system = OrderSystem::new(AppConfig::default());
        let order_id = dispatched_order(&system).await;
        let board = system.delivery_board();

        let mut feed = board.feed().await.unwrap();
        let on_road = feed.next().await.unwrap();
        assert_eq!(on_road.len(), 1);
        assert_eq!(on_road[0].id, order_id);

        let outcome = board.mark_delivered(&order_id).await.unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied { .. }));
        assert!(feed.next().await.unwrap().is_empty());

        // floor(2.5)
        assert_eq!(system.wallet.get_balance("uid_1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn marking_twice_is_harmless() {
        let system = OrderSystem::new(AppConfig::default());
        let order_id = dispatched_order(&system).await;
        let board = system.delivery_board();

        board.mark_delivered(&order_id).await.unwrap();
        assert_eq!(
            board.mark_delivered(&order_id).await.unwrap(),
            TransitionOutcome::Unchanged(OrderStatus::Delivered)
        );
        assert_eq!(system.wallet.get_balance("uid_1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_order_is_reported() {
        let system = OrderSystem::new(AppConfig::default());
        let board = system.delivery_board();
        assert_eq!(
            board.mark_delivered("order_x").await,
            Err(OrderError::NotFound("order_x".to_string()))
        );
    }
}
