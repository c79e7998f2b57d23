//! Streaming indicators.
//!
//! Every indicator is fed one bar at a time and reports NaN until it has
//! enough history. The `IndicatorBank` owns one instance per configured line
//! and hands the strategy an `IndicatorSnapshot` per bar.

pub mod angle;
pub mod atr;
pub mod bank;
pub mod ema;

pub use angle::{angle_degrees, AngleTracker};
pub use atr::Atr;
pub use bank::{EmaLine, IndicatorBank, IndicatorSnapshot};
pub use ema::{ema_of_series, Ema};

/// Create synthetic hourly bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 0.001, low = min(open,close) - 0.001.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::hours(i as i64),
                open,
                open.max(close) + 0.001,
                open.min(close) - 0.001,
                close,
                1_000.0,
            )
        })
        .collect()
}

/// Create hourly bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::new(base + chrono::Duration::hours(i as i64), open, high, low, close, 1_000.0)
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
