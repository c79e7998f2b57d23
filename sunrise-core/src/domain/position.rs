//! Position: the single open long holding.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open long position. At most one exists per engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_price: f64,
    pub size: u64,
    pub stop_level: f64,
    pub take_level: f64,
    pub bars_held: usize,
    pub trailing_high_watermark: f64,

    // ── Bookkeeping ──
    pub initial_stop: f64,
    pub entry_ts: DateTime<Utc>,
    pub entry_bar: usize,
    /// Live stop order, `None` after a reject or unsolicited cancel.
    pub stop_order: Option<OrderId>,
    /// Live take-profit order.
    pub limit_order: Option<OrderId>,
    /// Set once the trailing logic has moved the stop above `initial_stop`.
    pub stop_raised: bool,
}

impl Position {
    pub fn new(
        entry_price: f64,
        size: u64,
        stop_level: f64,
        take_level: f64,
        entry_ts: DateTime<Utc>,
        entry_bar: usize,
    ) -> Self {
        Self {
            entry_price,
            size,
            stop_level,
            take_level,
            bars_held: 0,
            trailing_high_watermark: entry_price,
            initial_stop: stop_level,
            entry_ts,
            entry_bar,
            stop_order: None,
            limit_order: None,
            stop_raised: false,
        }
    }

    /// Per-bar bookkeeping: count the bar and track the highest high seen.
    pub fn on_bar(&mut self, high: f64) {
        self.bars_held += 1;
        if high > self.trailing_high_watermark {
            self.trailing_high_watermark = high;
        }
    }

    /// Raise the stop. Returns false (and leaves the level alone) if the
    /// candidate does not improve on the current stop.
    pub fn raise_stop(&mut self, candidate: f64) -> bool {
        if !candidate.is_finite() || candidate <= self.stop_level {
            return false;
        }
        self.stop_level = candidate;
        self.stop_raised = true;
        true
    }

    pub fn unrealized_points(&self, price: f64) -> f64 {
        price - self.entry_price
    }
}
