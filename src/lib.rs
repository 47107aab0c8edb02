//! # Meatup Orders
//!
//! Order lifecycle and wallet-points ledger for a fresh-meat delivery store.
//!
//! ## Layout
//!
//! - **Foundation**
//!     - **Domain types** - plain business records → [`domain::Order`], [`domain::User`], [`domain::Product`]
//!     - **Resource actors** - one generic actor per collection, one mailbox per store → [`actor_framework::ResourceActor`]
//!     - **Entity rules** - creation, patches and actions per record → [`order_actor`], [`user_actor`], [`product_actor`]
//! - **Clients**
//!     - **Order store** - numbering, guarded transitions, ledger claims → [`clients::OrderStore`]
//!     - **Wallet ledger** - atomic balance increments and balance feeds → [`clients::WalletLedger`]
//!     - **Users and catalog** → [`clients::UserClient`], [`clients::CatalogClient`]
//! - **System**
//!     - **Lifecycle rules** - placement, cancellation, reconciliation → [`app_system::LifecycleController`]
//!     - **Session work** - status simulator and reconciliation sweep, tied to sign-in → [`app_system::CustomerSession`]
//!     - **Startup and shutdown** → [`app_system::OrderSystem`]
//!
//! ## Ledger rule
//!
//! Every wallet movement an order causes (credit on delivery, debit on
//! redemption, refund on cancellation) is recorded as a flag on the order.
//! The flag is claimed before the wallet moves and released if the wallet
//! write fails, so each movement happens at most once and anything left
//! undone is visible to the sweep.

pub mod actor_framework;
pub mod app_system;
pub mod clients;
pub mod clock;
pub mod config;
pub mod domain;
pub mod order_actor;
pub mod product_actor;
pub mod user_actor;

#[cfg(test)]
mod mock_framework;
