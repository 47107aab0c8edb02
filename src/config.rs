use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::PricingPolicy;

/// Runtime settings, read from `MEATUP_*` variables with sane defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub mailbox_capacity: usize,
    pub simulator_enabled: bool,
    pub simulator_interval: Duration,
    pub transaction_retries: u32,
    pub retry_backoff: Duration,
    pub reconcile_retry_after: Duration,
    pub first_order_discount_percent: Decimal,
    pub delivery_charge: Decimal,
    /// Offset that decides which calendar day an order is numbered in.
    pub business_offset: FixedOffset,
}

/// How hard to push a conflicting order-create transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Doubled after every failed attempt.
    pub backoff: Duration,
}

/// Background work owned by a customer session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub simulator_enabled: bool,
    pub simulator_interval: Duration,
    pub reconcile_retry_after: Duration,
}

const IST_OFFSET_MINUTES: i32 = 330;
const RETRY_BACKOFF_MS: u64 = 50;

fn business_offset(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

impl Default for AppConfig {
    fn default() -> Self {
        let pricing = PricingPolicy::default();
        Self {
            mailbox_capacity: 32,
            simulator_enabled: true,
            simulator_interval: Duration::from_secs(300),
            transaction_retries: 3,
            retry_backoff: Duration::from_millis(RETRY_BACKOFF_MS),
            reconcile_retry_after: Duration::from_secs(60),
            first_order_discount_percent: pricing.first_order_discount_percent,
            delivery_charge: pricing.delivery_charge,
            business_offset: business_offset(IST_OFFSET_MINUTES).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let offset_minutes: i32 = parse_or(
            &lookup,
            "MEATUP_BUSINESS_UTC_OFFSET_MINUTES",
            IST_OFFSET_MINUTES,
        )?;
        let business_offset = business_offset(offset_minutes).with_context(|| {
            format!("MEATUP_BUSINESS_UTC_OFFSET_MINUTES out of range: {offset_minutes}")
        })?;

        let mailbox_capacity =
            parse_or(&lookup, "MEATUP_MAILBOX_CAPACITY", defaults.mailbox_capacity)?;
        if mailbox_capacity == 0 {
            anyhow::bail!("MEATUP_MAILBOX_CAPACITY must be at least 1");
        }

        let interval_secs = parse_or(
            &lookup,
            "MEATUP_SIMULATOR_INTERVAL_SECS",
            defaults.simulator_interval.as_secs(),
        )?;
        if interval_secs == 0 {
            anyhow::bail!("MEATUP_SIMULATOR_INTERVAL_SECS must be at least 1");
        }

        let transaction_retries = parse_or(
            &lookup,
            "MEATUP_TRANSACTION_RETRIES",
            defaults.transaction_retries,
        )?;
        if transaction_retries == 0 {
            anyhow::bail!("MEATUP_TRANSACTION_RETRIES must be at least 1");
        }

        let first_order_discount_percent = parse_or(
            &lookup,
            "MEATUP_FIRST_ORDER_DISCOUNT_PERCENT",
            defaults.first_order_discount_percent,
        )?;
        if first_order_discount_percent < Decimal::ZERO
            || first_order_discount_percent > Decimal::ONE_HUNDRED
        {
            anyhow::bail!("MEATUP_FIRST_ORDER_DISCOUNT_PERCENT must be between 0 and 100");
        }

        let reconcile_secs = parse_or(
            &lookup,
            "MEATUP_RECONCILE_RETRY_SECS",
            defaults.reconcile_retry_after.as_secs(),
        )?;
        if reconcile_secs == 0 {
            anyhow::bail!("MEATUP_RECONCILE_RETRY_SECS must be at least 1");
        }

        let delivery_charge =
            parse_or(&lookup, "MEATUP_DELIVERY_CHARGE", defaults.delivery_charge)?;
        if delivery_charge < Decimal::ZERO {
            anyhow::bail!("MEATUP_DELIVERY_CHARGE must not be negative");
        }

        Ok(Self {
            mailbox_capacity,
            simulator_enabled: parse_or(
                &lookup,
                "MEATUP_SIMULATOR_ENABLED",
                defaults.simulator_enabled,
            )?,
            simulator_interval: Duration::from_secs(interval_secs),
            transaction_retries,
            retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "MEATUP_RETRY_BACKOFF_MS",
                RETRY_BACKOFF_MS,
            )?),
            reconcile_retry_after: Duration::from_secs(reconcile_secs),
            first_order_discount_percent,
            delivery_charge,
            business_offset,
        })
    }

    pub fn pricing(&self) -> PricingPolicy {
        PricingPolicy {
            first_order_discount_percent: self.first_order_discount_percent,
            delivery_charge: self.delivery_charge,
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.transaction_retries,
            backoff: self.retry_backoff,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            simulator_enabled: self.simulator_enabled,
            simulator_interval: self.simulator_interval,
            reconcile_retry_after: self.reconcile_retry_after,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        _ => Ok(default),
    }
}
