//! Engine: per-bar step, backtest driver and supporting records.
//!
//! The engine consumes one bar and the broker events delivered with it, and
//! returns the order commands for the execution layer:
//!
//! 1. Indicator update
//! 2. Broker-event reconciliation and exits for an open position
//! 3. Trailing-stop maintenance
//! 4. Entry search while flat

pub mod diagnostics;
pub mod ledger;
pub mod runner;
pub mod step;

pub use diagnostics::{Diagnostics, FilterAttrition};
pub use ledger::{JsonLinesLedger, LedgerError, LedgerSummary, MemoryLedger, TradeLedger};
pub use runner::{run_backtest, run_with_broker, RunResult, Runner};
pub use step::{Engine, SkipReason, StepAction, StepOutcome};
