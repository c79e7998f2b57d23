//! Trailing stop with ratchet
//!
//! **Core Rule:** the stop may rise, never fall (even if ATR expands).
//!
//! The trail only moves on bullish bars: candidate = low - ATR * multiplier.

use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    multiplier: f64,
    enabled: bool,
}

impl TrailingStop {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            multiplier: 0.0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the new stop level if this bar moves it up, `None` otherwise.
    ///
    /// # Example
    /// ```
    /// use sunrise_core::orders::TrailingStop;
    /// # use chrono::TimeZone;
    /// # let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    /// let trail = TrailingStop::new(2.0);
    /// let bar = sunrise_core::domain::Bar::new(ts, 1.1000, 1.1050, 1.0990, 1.1040, 0.0);
    ///
    /// // 1.0990 - 2 * 0.0010 = 1.0970 is above 1.0950: raise.
    /// assert!(trail.propose(&bar, 0.0010, 1.0950).is_some());
    /// // Never loosen.
    /// assert_eq!(trail.propose(&bar, 0.0010, 1.0980), None);
    /// ```
    pub fn propose(&self, bar: &Bar, atr: f64, current_stop: f64) -> Option<f64> {
        if !self.enabled || !bar.is_bullish() || !atr.is_finite() {
            return None;
        }
        let candidate = bar.low - atr * self.multiplier;
        (candidate.is_finite() && candidate > current_stop).then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars};

    #[test]
    fn raises_on_bullish_bar() {
        let bar = &make_ohlc_bars(&[(1.1000, 1.1050, 1.0990, 1.1040)])[0];
        let trail = TrailingStop::new(2.0);
        let level = trail.propose(bar, 0.0010, 1.0950).unwrap();
        assert_approx(level, 1.0970, 1e-12);
    }

    #[test]
    fn ignores_bearish_bars() {
        let bar = &make_ohlc_bars(&[(1.1040, 1.1050, 1.0990, 1.1000)])[0];
        assert_eq!(TrailingStop::new(2.0).propose(bar, 0.0010, 1.0900), None);
    }

    #[test]
    fn never_loosens_even_when_atr_expands() {
        let bar = &make_ohlc_bars(&[(1.1000, 1.1050, 1.0990, 1.1040)])[0];
        let trail = TrailingStop::new(2.0);
        assert_eq!(trail.propose(bar, 0.0100, 1.0950), None);
    }

    #[test]
    fn disabled_and_nan_never_move() {
        let bar = &make_ohlc_bars(&[(1.1000, 1.1050, 1.0990, 1.1040)])[0];
        assert_eq!(TrailingStop::disabled().propose(bar, 0.0010, 1.0), None);
        assert_eq!(TrailingStop::new(2.0).propose(bar, f64::NAN, 1.0), None);
    }
}
