use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::app_system::{due_entries, LifecycleController};
use crate::domain::Order;
use crate::order_actor::LedgerEntry;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub repaired: usize,
    pub failed: usize,
    /// Due, but failed too recently to try again.
    pub deferred: usize,
}

/// Safety net run over every new snapshot of a customer's orders.
///
/// Repairs missing credits, debits and refunds, and a first-order flag that
/// never flipped. A repair that fails is not retried within `retry_after`,
/// which keeps a failing wallet step from spinning on its own release.
pub struct ReconciliationSweep {
    controller: LifecycleController,
    retry_after: Duration,
    last_attempt: HashMap<(String, LedgerEntry), Instant>,
    first_order_confirmed: bool,
}

impl ReconciliationSweep {
    pub fn new(controller: LifecycleController, retry_after: Duration) -> Self {
        Self {
            controller,
            retry_after,
            last_attempt: HashMap::new(),
            first_order_confirmed: false,
        }
    }

    pub async fn sweep(&mut self, orders: &[Order]) -> SweepReport {
        let mut report = SweepReport::default();

        let due: HashSet<(String, LedgerEntry)> = orders
            .iter()
            .flat_map(|order| {
                due_entries(order)
                    .into_iter()
                    .map(move |entry| (order.id.clone(), entry))
            })
            .collect();
        self.last_attempt.retain(|key, _| due.contains(key));

        for order in orders {
            for entry in due_entries(order) {
                let key = (order.id.clone(), entry);
                if let Some(at) = self.last_attempt.get(&key) {
                    if at.elapsed() < self.retry_after {
                        report.deferred += 1;
                        continue;
                    }
                }

                match self.controller.orders().settle(&order.id, entry).await {
                    Ok(applied) => {
                        if applied.is_some() {
                            debug!(order_id = %order.id, ?entry, "Sweep repaired entry");
                            report.repaired += 1;
                        }
                        self.last_attempt.remove(&key);
                    }
                    Err(e) => {
                        warn!(order_id = %order.id, ?entry, error = %e, "Sweep repair failed");
                        self.last_attempt.insert(key, Instant::now());
                        report.failed += 1;
                    }
                }
            }
        }

        if !self.first_order_confirmed {
            if let Some(order) = orders.first() {
                match self.controller.ensure_first_order_flag(&order.user_id).await {
                    Ok(_) => self.first_order_confirmed = true,
                    Err(e) => warn!(error = %e, "Could not confirm first-order flag"),
                }
            }
        }

        report
    }
}
