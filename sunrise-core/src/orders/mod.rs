//! Order management
//!
//! Owns the open position, its sibling stop/limit orders, the trailing-stop
//! ratchet and broker-event reconciliation.

pub mod lifecycle;
pub mod trailing;

pub use lifecycle::{
    trade_pnl, EntryPlan, LifecycleSettings, OrderLifecycleManager, Reconciliation, Repair,
};
pub use trailing::TrailingStop;
