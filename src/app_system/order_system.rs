use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actor_framework::ResourceActor;
use crate::app_system::{CustomerSession, DeliveryBoard, LifecycleController, SessionManager};
use crate::clients::{CatalogClient, OrderStore, UserClient, WalletLedger};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::domain::{Order, Product, User};
use crate::order_actor::OrderError;

fn next_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// The main application system that orchestrates all actors.
///
/// Responsible for starting up actors, wiring them together, and handling shutdown.
pub struct OrderSystem {
    pub users: UserClient,
    pub wallet: WalletLedger,
    pub catalog: CatalogClient,
    pub orders: OrderStore,
    pub lifecycle: LifecycleController,
    config: AppConfig,
    handles: Vec<JoinHandle<()>>,
}

impl OrderSystem {
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.mailbox_capacity;

        // 1. Users: ids come from the identity provider
        let (user_actor, user_resource_client) =
            ResourceActor::<User>::new("users", capacity, next_uuid);
        let users = UserClient::new(user_resource_client).with_clock(clock.clone());
        let user_handle = tokio::spawn(user_actor.run());

        // 2. Catalog
        let (product_actor, product_resource_client) =
            ResourceActor::<Product>::new("products", capacity, next_uuid);
        let catalog = CatalogClient::new(product_resource_client);
        let product_handle = tokio::spawn(product_actor.run());

        // 3. Orders, numbered per business day
        let (order_actor, order_resource_client) =
            ResourceActor::<Order>::new("orders", capacity, next_uuid);
        let wallet = users.wallet();
        let orders = OrderStore::new(
            order_resource_client,
            wallet.clone(),
            clock,
            config.business_offset,
        );
        let order_handle = tokio::spawn(order_actor.run());

        let lifecycle = LifecycleController::new(
            users.clone(),
            catalog.clone(),
            orders.clone(),
            config.pricing(),
            config.retry(),
        );

        Self {
            users,
            wallet,
            catalog,
            orders,
            lifecycle,
            config,
            handles: vec![user_handle, product_handle, order_handle],
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn delivery_board(&self) -> DeliveryBoard {
        DeliveryBoard::new(self.orders.clone())
    }

    pub async fn start_session(&self, user_id: &str) -> Result<CustomerSession, OrderError> {
        CustomerSession::start(self.lifecycle.clone(), user_id, self.config.session()).await
    }

    /// A manager that opens and closes customer sessions as `auth` changes.
    pub fn session_manager(&self, auth: watch::Receiver<Option<String>>) -> SessionManager {
        SessionManager::new(self.lifecycle.clone(), self.config.session(), auth)
    }

    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        if let Err(e) = self.orders.shutdown().await {
            warn!(error = %e, "Order actor already stopped");
        }
        if let Err(e) = self.catalog.shutdown().await {
            warn!(error = %e, "Catalog actor already stopped");
        }
        if let Err(e) = self.users.shutdown().await {
            warn!(error = %e, "User actor already stopped");
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(format!("Actor task failed: {:?}", e));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
