pub use crate::domain::LedgerEntry;
use crate::domain::OrderStatus;

/// Proof that the order record reserved a ledger entry. The holder must apply
/// it to the wallet and confirm it, or release it so a later sweep can retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerClaim {
    pub order_id: String,
    pub user_id: String,
    pub entry: LedgerEntry,
    pub points: u64,
}

impl LedgerClaim {
    /// Signed wallet delta this claim stands for.
    pub fn delta(&self) -> i64 {
        let points = i64::try_from(self.points).unwrap_or(i64::MAX);
        match self.entry {
            LedgerEntry::Credit | LedgerEntry::Refund => points,
            LedgerEntry::Debit => -points,
        }
    }
}

/// Custom actions for Order records. Each runs as one atomic read-check-write.
#[derive(Debug, Clone)]
pub enum OrderAction {
    /// Move along the pipeline. Entering `delivered` claims the credit in the
    /// same write.
    Transition(OrderStatus),
    /// `pending -> cancelled`, claiming the refund in the same write.
    Cancel,
    /// Reserve a ledger entry if it is due and not yet taken.
    Claim(LedgerEntry),
    /// Mark an outstanding claim as applied to the wallet.
    Confirm(LedgerEntry),
    /// Hand back an outstanding claim whose wallet step failed. Applied
    /// entries cannot be released.
    Release(LedgerEntry),
    /// Raw status write that skips the transition guard and the ledger.
    #[cfg(test)]
    ForceStatus(OrderStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        from: OrderStatus,
        to: OrderStatus,
        credit: Option<LedgerClaim>,
    },
    /// Already in the requested state.
    Unchanged(OrderStatus),
    /// Terminal order, move backwards, or cancellation through the wrong door.
    Rejected { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The flag is set. `follow_up` is an entry this made due, namely the
    /// refund of a debit that landed after the order was cancelled.
    Confirmed { follow_up: Option<LedgerClaim> },
    /// No such claim was outstanding.
    NotOutstanding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { refund: Option<LedgerClaim> },
    NotCancellable(OrderStatus),
}

/// Results from OrderActions - variants match 1:1 with OrderAction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderActionResult {
    Transition(TransitionOutcome),
    Cancel(CancelOutcome),
    Claim(Option<LedgerClaim>),
    Confirm(ConfirmOutcome),
    Release(bool),
    #[cfg(test)]
    ForceStatus,
}
