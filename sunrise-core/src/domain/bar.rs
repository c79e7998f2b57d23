//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for the traded instrument.
///
/// Bars arrive from the feed in timestamp order. The core never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close strictly below open. A doji is neither bullish nor bearish.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Median price (H+L)/2, the input series for every EMA line.
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
            1.1000,
            1.1050,
            1.0980,
            1.1030,
            1_000.0,
        )
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 1.0970; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn candle_direction() {
        let bar = sample_bar();
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());

        let mut doji = sample_bar();
        doji.close = doji.open;
        assert!(!doji.is_bullish());
        assert!(!doji.is_bearish());
    }

    #[test]
    fn median_price_is_midpoint_of_range() {
        let bar = sample_bar();
        assert!((bar.median_price() - 1.1015).abs() < 1e-12);
    }
}
