use rust_decimal::Decimal;

use super::actions::{
    CancelOutcome, ConfirmOutcome, LedgerClaim, LedgerEntry, OrderAction, OrderActionResult,
    TransitionOutcome,
};
use crate::actor_framework::Entity;
use crate::domain::{format_display_id, DailyCounter, Order, OrderCreate, OrderPatch, OrderStatus};

impl Entity for Order {
    type Id = String;
    type CreatePayload = OrderCreate;
    type Patch = OrderPatch;
    type Action = OrderAction;
    type ActionResult = OrderActionResult;
    type Context = DailyCounter;

    fn id(&self) -> &String {
        &self.id
    }

    /// Creates a new Order and numbers it for its business day.
    ///
    /// # Notes
    /// The counter bump lives in the collection context, so it commits
    /// together with the order or not at all.
    fn from_create(
        id: String,
        params: OrderCreate,
        counter: &mut DailyCounter,
    ) -> Result<Self, String> {
        let draft = params.draft;

        if draft.items.is_empty() {
            return Err("order has no items".to_string());
        }
        if let Some(item) = draft
            .items
            .iter()
            .find(|item| item.quantity == 0 || item.weight <= Decimal::ZERO)
        {
            return Err(format!(
                "invalid quantity or weight for {}",
                item.product_id
            ));
        }
        if draft.final_amount < Decimal::ZERO {
            return Err(format!("final amount is negative: {}", draft.final_amount));
        }

        let sequence = counter.next(params.business_date);

        Ok(Self {
            id,
            display_id: format_display_id(params.business_date, sequence),
            user_id: draft.user_id,
            items: draft.items,
            total_amount: draft.total_amount,
            discount: draft.discount,
            wallet_used: draft.wallet_used,
            delivery_charge: draft.delivery_charge,
            final_amount: draft.final_amount,
            earned_points: draft.earned_points,
            points_credited: false,
            wallet_debited: false,
            wallet_refunded: false,
            claims_in_flight: Vec::new(),
            status: OrderStatus::Pending,
            address: draft.address,
            delivery_estimate: draft.delivery_estimate,
            note: draft.note,
            created_at: params.created_at,
        })
    }

    /// Address, estimate and note stay editable until the order leaves the shop.
    fn on_update(&mut self, patch: OrderPatch) -> Result<(), String> {
        if matches!(
            self.status,
            OrderStatus::OutForDelivery | OrderStatus::Delivered | OrderStatus::Cancelled
        ) {
            return Err(format!("order is already {}", self.status));
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(estimate) = patch.delivery_estimate {
            self.delivery_estimate = Some(estimate);
        }
        if let Some(note) = patch.note {
            self.note = Some(note);
        }
        Ok(())
    }

    fn handle_action(&mut self, action: OrderAction) -> Result<OrderActionResult, String> {
        let result = match action {
            OrderAction::Transition(to) => OrderActionResult::Transition(self.transition(to)),
            OrderAction::Cancel => OrderActionResult::Cancel(self.cancel()),
            OrderAction::Claim(entry) => OrderActionResult::Claim(self.claim(entry)),
            OrderAction::Confirm(entry) => OrderActionResult::Confirm(self.confirm(entry)),
            OrderAction::Release(entry) => OrderActionResult::Release(self.release(entry)),
            #[cfg(test)]
            OrderAction::ForceStatus(status) => {
                self.status = status;
                OrderActionResult::ForceStatus
            }
        };
        Ok(result)
    }
}

impl Order {
    fn transition(&mut self, to: OrderStatus) -> TransitionOutcome {
        let from = self.status;
        if to == from {
            return TransitionOutcome::Unchanged(from);
        }

        let regresses = match (from.rank(), to.rank()) {
            (Some(current), Some(target)) => target < current,
            _ => true,
        };
        if from.is_terminal() || regresses {
            return TransitionOutcome::Rejected { from, to };
        }

        self.status = to;
        let credit = if to == OrderStatus::Delivered {
            self.claim(LedgerEntry::Credit)
        } else {
            None
        };
        TransitionOutcome::Applied { from, to, credit }
    }

    fn cancel(&mut self) -> CancelOutcome {
        if self.status != OrderStatus::Pending {
            return CancelOutcome::NotCancellable(self.status);
        }
        self.status = OrderStatus::Cancelled;
        CancelOutcome::Cancelled {
            refund: self.claim(LedgerEntry::Refund),
        }
    }

    fn claim(&mut self, entry: LedgerEntry) -> Option<LedgerClaim> {
        let (due, points) = match entry {
            LedgerEntry::Credit => (self.needs_credit(), self.earned_points),
            LedgerEntry::Debit => (self.needs_debit(), self.wallet_used),
            LedgerEntry::Refund => (self.needs_refund(), self.wallet_used),
        };
        if !due {
            return None;
        }
        self.claims_in_flight.push(entry);

        Some(LedgerClaim {
            order_id: self.id.clone(),
            user_id: self.user_id.clone(),
            entry,
            points,
        })
    }

    fn confirm(&mut self, entry: LedgerEntry) -> ConfirmOutcome {
        if !self.take_in_flight(entry) {
            return ConfirmOutcome::NotOutstanding;
        }
        *self.flag_mut(entry) = true;

        // A cancel that landed while the debit was in flight owes the refund now
        let follow_up = match entry {
            LedgerEntry::Debit => self.claim(LedgerEntry::Refund),
            _ => None,
        };
        ConfirmOutcome::Confirmed { follow_up }
    }

    fn release(&mut self, entry: LedgerEntry) -> bool {
        self.take_in_flight(entry)
    }

    fn take_in_flight(&mut self, entry: LedgerEntry) -> bool {
        match self.claims_in_flight.iter().position(|claimed| *claimed == entry) {
            Some(index) => {
                self.claims_in_flight.remove(index);
                true
            }
            None => false,
        }
    }

    fn flag_mut(&mut self, entry: LedgerEntry) -> &mut bool {
        match entry {
            LedgerEntry::Credit => &mut self.points_credited,
            LedgerEntry::Debit => &mut self.wallet_debited,
            LedgerEntry::Refund => &mut self.wallet_refunded,
        }
    }
}
