use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app_system::LifecycleController;
use crate::domain::Order;
use crate::order_actor::TransitionOutcome;

/// Pushes a session's live orders one step along the pipeline per tick.
///
/// Every move goes through the guarded advance, so orders cancelled or
/// delivered elsewhere in the meantime are left alone.
pub struct StatusSimulator {
    controller: LifecycleController,
    interval: Duration,
}

impl StatusSimulator {
    pub fn new(controller: LifecycleController, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    /// One pass over `orders`. Returns how many actually moved.
    pub async fn tick(&self, orders: &[Order]) -> usize {
        let mut advanced = 0;
        for order in orders.iter().filter(|order| !order.status.is_terminal()) {
            let Some(next) = order.status.next() else {
                continue;
            };
            match self.controller.advance_status(&order.id, next).await {
                Ok(Some(TransitionOutcome::Applied { .. })) => advanced += 1,
                Ok(outcome) => debug!(order_id = %order.id, ?outcome, "Order not advanced"),
                Err(e) => warn!(order_id = %order.id, error = %e, "Simulator step failed"),
            }
        }
        advanced
    }

    /// Tick every interval over the latest known orders until cancelled.
    pub async fn run(self, known: watch::Receiver<Vec<Order>>, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Status simulator starting");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let orders = known.borrow().clone();
                    let advanced = self.tick(&orders).await;
                    debug!(advanced, "Simulator tick");
                }
            }
        }

        info!("Status simulator stopped");
    }
}
