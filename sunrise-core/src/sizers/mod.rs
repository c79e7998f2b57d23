//! Position Sizers: determine contract quantity
//!
//! Sizers translate a risk budget and a stop distance into whole contracts.
//! They are account-aware (use equity) but know nothing about signals.

pub mod risk;

pub use risk::RiskSizer;

/// Position sizing logic
///
/// # Returns
/// `Some(contracts)` with `contracts >= 1`, or `None` when the trade cannot be
/// sized (zero distance, non-finite inputs, or less than one contract). A
/// `None` is a silent skip, never an error.
pub trait PositionSizer: Send + Sync {
    fn size(&self, equity: f64, entry: f64, stop: f64) -> Option<u64>;

    /// Sizer name for logging
    fn name(&self) -> &str;
}
