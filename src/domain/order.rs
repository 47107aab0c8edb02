use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order.
///
/// ```text
/// pending -> confirmed -> received -> cutting -> packing -> out_for_delivery -> delivered
///    |
///    +-> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Received,
    Cutting,
    Packing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The delivery pipeline, in order. `Cancelled` is off the pipeline.
    pub const PIPELINE: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Received,
        OrderStatus::Cutting,
        OrderStatus::Packing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position in the pipeline, `None` for `Cancelled`.
    pub fn rank(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|status| *status == self)
    }

    /// The next pipeline state, `None` for terminal states.
    pub fn next(self) -> Option<OrderStatus> {
        self.rank()
            .and_then(|rank| Self::PIPELINE.get(rank + 1))
            .copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Received => "received",
            OrderStatus::Cutting => "cutting",
            OrderStatus::Packing => "packing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Customer-facing label.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Received => "Received",
            OrderStatus::Cutting => "Cutting",
            OrderStatus::Packing => "Packing",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One priced line of a placed order. `unit_price` is a snapshot taken at
/// checkout and never follows later catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub weight: Decimal,
    pub unit_price: Decimal,
    pub cutting_type: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * self.weight * Decimal::from(self.quantity)
    }

    /// Kilograms (or unit-equivalents) this line contributes to earned points.
    pub fn measure(&self) -> Decimal {
        self.weight * Decimal::from(self.quantity)
    }
}

/// Represents a customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub display_id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub wallet_used: u64,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
    pub earned_points: u64,
    /// Ledger flags. Each is set only after its wallet movement went through.
    pub points_credited: bool,
    pub wallet_debited: bool,
    pub wallet_refunded: bool,
    /// Entries claimed for a wallet step that has not been confirmed yet.
    #[serde(default)]
    pub claims_in_flight: Vec<LedgerEntry>,
    pub status: OrderStatus,
    pub address: String,
    pub delivery_estimate: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A wallet movement tied to one order. Each happens at most once per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEntry {
    /// Earned points paid out on delivery.
    Credit,
    /// Redeemed points taken at checkout.
    Debit,
    /// Redeemed points given back on cancellation.
    Refund,
}

impl Order {
    /// Delivered but the earned points never reached the wallet.
    pub fn needs_credit(&self) -> bool {
        self.status == OrderStatus::Delivered
            && !self.points_credited
            && self.earned_points > 0
            && !self.is_in_flight(LedgerEntry::Credit)
    }

    /// Redeemed points not yet taken from the wallet of a live order.
    pub fn needs_debit(&self) -> bool {
        self.wallet_used > 0
            && !self.wallet_debited
            && self.status != OrderStatus::Cancelled
            && !self.is_in_flight(LedgerEntry::Debit)
    }

    /// Cancelled after its redemption was taken, and not yet given back.
    ///
    /// Only a confirmed debit counts: one still in flight owes nothing yet.
    pub fn needs_refund(&self) -> bool {
        self.status == OrderStatus::Cancelled
            && self.wallet_debited
            && !self.wallet_refunded
            && !self.is_in_flight(LedgerEntry::Refund)
    }

    pub fn is_in_flight(&self, entry: LedgerEntry) -> bool {
        self.claims_in_flight.contains(&entry)
    }
}

/// Everything the checkout computes before the order is written.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub wallet_used: u64,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
    pub earned_points: u64,
    pub address: String,
    pub delivery_estimate: Option<String>,
    pub note: Option<String>,
}

/// Payload for creating a new order: the draft stamped by the store.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub draft: OrderDraft,
    pub created_at: DateTime<Utc>,
    /// Calendar day the display id is numbered in.
    pub business_date: NaiveDate,
}

/// Customer edits allowed before dispatch.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub address: Option<String>,
    pub delivery_estimate: Option<String>,
    pub note: Option<String>,
}

/// What checkout hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    pub display_id: String,
}

/// Newest first by `created_at`, ties broken by display id.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.display_id.cmp(&a.display_id))
    });
}
