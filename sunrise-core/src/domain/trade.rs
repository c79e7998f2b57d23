//! ClosedTrade: a completed round trip, emitted exactly once per position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Stop,
    TakeProfit,
    TrailingStop,
    BarCount,
    IndicatorCross,
    ManualClose,
    /// Protective order lost and the orphan policy chose to flatten.
    ProtectionLost,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Stop => "STOP",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::BarCount => "BAR_COUNT",
            ExitReason::IndicatorCross => "INDICATOR_CROSS",
            ExitReason::ManualClose => "MANUAL_CLOSE",
            ExitReason::ProtectionLost => "PROTECTION_LOST",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    // ── Entry ──
    pub entry_price: f64,
    pub entry_ts: DateTime<Utc>,

    // ── Exit ──
    pub exit_price: f64,
    pub exit_ts: DateTime<Utc>,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub size: u64,

    // ── PnL ──
    pub pnl: f64,
    pub pnl_after_cost: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl_after_cost > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exit_reason_serializes_screaming() {
        let json = serde_json::to_string(&ExitReason::TrailingStop).unwrap();
        assert_eq!(json, "\"TRAILING_STOP\"");
        assert_eq!(ExitReason::TakeProfit.to_string(), "TAKE_PROFIT");
    }

    #[test]
    fn winner_uses_net_pnl() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let trade = ClosedTrade {
            entry_price: 1.1,
            entry_ts: ts,
            exit_price: 1.1001,
            exit_ts: ts,
            exit_reason: ExitReason::ManualClose,
            size: 1,
            pnl: 10.0,
            pnl_after_cost: -2.5,
            bars_held: 3,
        };
        assert!(!trade.is_winner());
    }
}
