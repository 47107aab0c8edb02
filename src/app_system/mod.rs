//! System orchestration: order lifecycle rules, background session work,
//! startup and shutdown.

pub mod delivery;
pub mod lifecycle;
pub mod order_system;
pub mod reconciliation;
pub mod session;
pub mod simulator;
pub mod telemetry;

pub use delivery::*;
pub use lifecycle::*;
pub use order_system::*;
pub use reconciliation::*;
pub use session::*;
pub use simulator::*;
pub use telemetry::*;
