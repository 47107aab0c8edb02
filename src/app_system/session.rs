use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::app_system::{LifecycleController, ReconciliationSweep, StatusSimulator};
use crate::config::SessionConfig;
use crate::domain::Order;
use crate::order_actor::OrderError;

/// Background work that lives exactly as long as one signed-in customer.
///
/// Owns three tasks: the order feed, the reconciliation sweep and (when
/// enabled) the status simulator. Ending or dropping the session cancels all
/// of them, so nothing keeps mutating orders after logout.
pub struct CustomerSession {
    user_id: String,
    orders: watch::Receiver<Vec<Order>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CustomerSession {
    #[instrument(skip(controller, config))]
    pub async fn start(
        controller: LifecycleController,
        user_id: &str,
        config: SessionConfig,
    ) -> Result<Self, OrderError> {
        let mut feed = controller.orders().subscribe_for_user(user_id).await?;
        let initial = feed.next().await.unwrap_or_default();
        let (orders_tx, orders) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let token = cancel.clone();
        tasks.push(tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        snapshot = feed.next() => match snapshot {
                            Some(snapshot) => {
                                orders_tx.send_replace(snapshot);
                            }
                            None => {
                                warn!("Order feed closed");
                                break;
                            }
                        },
                    }
                }
                feed.unsubscribe();
            }
            .in_current_span(),
        ));

        let mut sweep = ReconciliationSweep::new(controller.clone(), config.reconcile_retry_after);
        let mut changes = orders.clone();
        let token = cancel.clone();
        tasks.push(tokio::spawn(
            async move {
                let retry = config.reconcile_retry_after;
                let mut retry_ticker = interval_at(Instant::now() + retry, retry);
                retry_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    let snapshot = changes.borrow_and_update().clone();
                    let report = sweep.sweep(&snapshot).await;
                    debug!(?report, "Sweep finished");

                    tokio::select! {
                        _ = token.cancelled() => break,
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = retry_ticker.tick() => {}
                    }
                }
            }
            .in_current_span(),
        ));

        if config.simulator_enabled {
            let simulator = StatusSimulator::new(controller.clone(), config.simulator_interval);
            tasks.push(tokio::spawn(
                simulator
                    .run(orders.clone(), cancel.clone())
                    .in_current_span(),
            ));
        }

        info!("Customer session started");
        Ok(Self {
            user_id: user_id.to_string(),
            orders,
            cancel,
            tasks,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Latest order snapshot, newest first.
    pub fn orders(&self) -> watch::Receiver<Vec<Order>> {
        self.orders.clone()
    }

    /// Cancel the background tasks and wait for them to finish.
    pub async fn end(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                error!(error = ?e, "Session task failed");
            }
        }
        info!(user_id = %self.user_id, "Customer session ended");
    }
}

impl Drop for CustomerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Follows the identity provider: one customer session per signed-in user.
pub struct SessionManager {
    controller: LifecycleController,
    config: SessionConfig,
    auth: watch::Receiver<Option<String>>,
    active: watch::Sender<Option<String>>,
}

impl SessionManager {
    pub fn new(
        controller: LifecycleController,
        config: SessionConfig,
        auth: watch::Receiver<Option<String>>,
    ) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            controller,
            config,
            auth,
            active,
        }
    }

    /// User id of the running session, if any.
    pub fn active(&self) -> watch::Receiver<Option<String>> {
        self.active.subscribe()
    }

    /// React to sign-in, sign-out and account switches until `shutdown`.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut current: Option<CustomerSession> = None;

        loop {
            let wanted = self.auth.borrow_and_update().clone();
            let running = current.as_ref().map(|session| session.user_id().to_string());

            if running != wanted {
                if let Some(session) = current.take() {
                    session.end().await;
                }
                if let Some(user_id) = &wanted {
                    match CustomerSession::start(self.controller.clone(), user_id, self.config).await
                    {
                        Ok(session) => current = Some(session),
                        Err(e) => error!(user_id = %user_id, error = %e, "Could not start session"),
                    }
                }
                let active = current.as_ref().map(|session| session.user_id().to_string());
                self.active.send_replace(active);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = self.auth.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(session) = current.take() {
            session.end().await;
        }
        self.active.send_replace(None);
        info!("Session manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_system::{CartLine, OrderSystem, PlaceOrder};
    use crate::config::AppConfig;
    use crate::domain::{OrderStatus, Product, UserCreate};
    use rust_decimal::Decimal;
    use std::time::Duration;

    async fn system() -> (OrderSystem, String) {
        let system = OrderSystem::new(AppConfig::default());
        for (id, name) in [("uid_1", "Asha"), ("uid_2", "Ravi")] {
            system
                .users
                .create_user(UserCreate::new(id, name, format!("{id}@example.com")))
                .await
                .unwrap();
        }
        let product = system
            .catalog
            .create_product(Product::new("", "Chicken", Decimal::from(250), "kg").into())
            .await
            .unwrap();
        (system, product)
    }

    async fn place(system: &OrderSystem, user_id: &str, product: &str) -> String {
        system
            .lifecycle
            .place_order(PlaceOrder {
                user_id: user_id.to_string(),
                lines: vec![CartLine {
                    product_id: product.to_string(),
                    quantity: 1,
                    weight: Decimal::from(3),
                    cutting_type: None,
                }],
                address: String::new(),
                delivery_estimate: None,
                redeem_points: 0,
                note: None,
            })
            .await
            .unwrap()
            .id
    }

    fn config(simulator_enabled: bool) -> SessionConfig {
        SessionConfig {
            simulator_enabled,
            simulator_interval: Duration::from_secs(300),
            reconcile_retry_after: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_stops_when_the_session_ends() {
        let (system, product) = system().await;
        let order_id = place(&system, "uid_1", &product).await;

        let session = CustomerSession::start(system.lifecycle.clone(), "uid_1", config(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(
            system.orders.get_by_id(&order_id).await.unwrap().status,
            OrderStatus::Confirmed
        );

        session.end().await;
        tokio::time::sleep(Duration::from_secs(3000)).await;
        assert_eq!(
            system.orders.get_by_id(&order_id).await.unwrap().status,
            OrderStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn session_feed_tracks_orders() {
        let (system, product) = system().await;
        let session = CustomerSession::start(system.lifecycle.clone(), "uid_1", config(false))
            .await
            .unwrap();
        let mut orders = session.orders();
        assert!(orders.borrow().is_empty());

        let order_id = place(&system, "uid_1", &product).await;
        place(&system, "uid_2", &product).await;

        orders
            .wait_for(|snapshot| snapshot.iter().any(|o| o.id == order_id))
            .await
            .unwrap();
        assert!(orders.borrow().iter().all(|o| o.user_id == "uid_1"));
        session.end().await;
    }

    #[tokio::test]
    async fn sweep_repairs_credit_seen_on_the_feed() {
        let (system, product) = system().await;
        let order_id = place(&system, "uid_1", &product).await;

        let session = CustomerSession::start(system.lifecycle.clone(), "uid_1", config(false))
            .await
            .unwrap();
        let mut balance = system.wallet.subscribe("uid_1").await.unwrap();
        assert_eq!(balance.next().await, Some(0));

        // an outside writer delivers without crediting
        system
            .orders
            .force_status(&order_id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(balance.next().await, Some(3));

        let mut orders = session.orders();
        orders
            .wait_for(|snapshot| snapshot.iter().all(|o| o.points_credited))
            .await
            .unwrap();
        session.end().await;
    }

    #[tokio::test]
    async fn manager_follows_sign_in_and_out() {
        let (system, _) = system().await;
        let (auth_tx, auth) = watch::channel(None);
        let manager = SessionManager::new(system.lifecycle.clone(), config(false), auth);
        let mut active = manager.active();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(manager.run(shutdown.clone()));

        auth_tx.send_replace(Some("uid_1".to_string()));
        active
            .wait_for(|user| user.as_deref() == Some("uid_1"))
            .await
            .unwrap();

        auth_tx.send_replace(Some("uid_2".to_string()));
        active
            .wait_for(|user| user.as_deref() == Some("uid_2"))
            .await
            .unwrap();

        auth_tx.send_replace(None);
        active.wait_for(|user| user.is_none()).await.unwrap();

        shutdown.cancel();
        handle.await.unwrap();
    }
}
