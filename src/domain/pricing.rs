//! Checkout arithmetic.
//!
//! All amounts are `Decimal` rounded to two places, half away from zero.
//! One wallet point redeems one currency unit.

use rust_decimal::prelude::*;

use super::order::OrderItem;

const DECIMAL_PLACES: u32 = 2;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Discount and charge rules applied at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    pub first_order_discount_percent: Decimal,
    pub delivery_charge: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            first_order_discount_percent: Decimal::from(10),
            delivery_charge: Decimal::ZERO,
        }
    }
}

/// Monetary breakdown of a cart about to become an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub wallet_used: u64,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
    pub earned_points: u64,
}

impl PricingPolicy {
    /// # Arguments
    /// * `items` - priced lines with their snapshot unit prices
    /// * `first_order` - the owner has not completed an order yet
    /// * `redeem_points` - wallet points applied to this order
    ///
    /// `final_amount` may come out negative; callers reject that before writing.
    pub fn quote(&self, items: &[OrderItem], first_order: bool, redeem_points: u64) -> Quote {
        let total_amount = round_money(items.iter().map(OrderItem::line_total).sum());

        let discount = if first_order {
            round_money(total_amount * self.first_order_discount_percent / Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };

        let final_amount = total_amount - discount - Decimal::from(redeem_points)
            + self.delivery_charge;

        Quote {
            total_amount,
            discount,
            wallet_used: redeem_points,
            delivery_charge: self.delivery_charge,
            final_amount,
            earned_points: earned_points(items),
        }
    }
}

/// Floor of the total kg-equivalent across all lines.
pub fn earned_points(items: &[OrderItem]) -> u64 {
    let measure: Decimal = items.iter().map(OrderItem::measure).sum();
    measure.floor().to_u64().unwrap_or(0)
}
