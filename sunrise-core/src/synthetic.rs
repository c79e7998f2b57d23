//! Deterministic synthetic bar feed.
//!
//! A seeded random walk with trending regimes, standing in for the external
//! data feed in the CLI, the integration tests and the benchmarks. The same
//! seed always produces the same bars.

use crate::config::ConfigError;
use crate::domain::Bar;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fields are private so a feed can only be built from checked parameters;
/// `generate` samples drift from `[-max_drift, max_drift]` and would panic on
/// a negative or NaN bound.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    start: DateTime<Utc>,
    interval: Duration,
    start_price: f64,
    /// Per-bar standard deviation of the close-to-close move, in price units.
    volatility: f64,
    /// Largest per-bar drift a trending regime can carry.
    max_drift: f64,
    /// Mean number of bars a regime lasts.
    regime_length: usize,
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            interval: Duration::hours(1),
            start_price: 1.1000,
            volatility: 0.0008,
            max_drift: 0.0004,
            regime_length: 40,
        }
    }
}

impl SyntheticFeed {
    /// Hourly feed from the default start with the given price shape.
    pub fn new(start_price: f64, volatility: f64, max_drift: f64) -> Result<Self, ConfigError> {
        if !(start_price.is_finite() && start_price > 0.0) {
            return Err(invalid("start_price", format!("must be positive, got {start_price}")));
        }
        if !(volatility.is_finite() && volatility >= 0.0) {
            return Err(invalid("volatility", format!("must be >= 0, got {volatility}")));
        }
        if !(max_drift.is_finite() && max_drift >= 0.0) {
            return Err(invalid("max_drift", format!("must be >= 0, got {max_drift}")));
        }
        Ok(Self {
            start_price,
            volatility,
            max_drift,
            ..Self::default()
        })
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval <= Duration::zero() {
            return Err(invalid("interval", format!("must be positive, got {interval}")));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Zero is treated as one bar.
    pub fn with_regime_length(mut self, bars: usize) -> Self {
        self.regime_length = bars.max(1);
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn generate(&self, n: usize, seed: u64) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bars = Vec::with_capacity(n);
        let mut prev_close = self.start_price;
        let mut drift = 0.0;
        let mut regime_left = 0usize;
        let floor = self.start_price * 0.05;

        for i in 0..n {
            if regime_left == 0 {
                drift = rng.gen_range(-self.max_drift..=self.max_drift);
                regime_left = rng.gen_range(1..=self.regime_length.max(1) * 2);
            }
            regime_left -= 1;

            let open = prev_close;
            let close = (open + drift + gaussian(&mut rng) * self.volatility).max(floor);
            let wick_up = rng.gen::<f64>() * self.volatility;
            let wick_down = rng.gen::<f64>() * self.volatility;
            let high = open.max(close) + wick_up;
            let low = (open.min(close) - wick_down).max(floor * 0.5);

            let ts = self.start + self.interval * i as i32;
            let volume = rng.gen_range(500.0..5_000.0);
            bars.push(Bar::new(ts, open, high, low, close, volume));
            prev_close = close;
        }
        bars
    }
}

/// Convenience: `n` hourly bars from the default feed.
pub fn synthetic_bars(n: usize, seed: u64) -> Vec<Bar> {
    SyntheticFeed::default().generate(n, seed)
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

/// Approximately standard normal: sum of twelve uniforms minus six.
fn gaussian(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bars() {
        assert_eq!(synthetic_bars(300, 7), synthetic_bars(300, 7));
        assert_ne!(synthetic_bars(300, 7), synthetic_bars(300, 8));
    }

    #[test]
    fn bars_are_sane_and_ordered() {
        let bars = synthetic_bars(2_000, 42);
        assert_eq!(bars.len(), 2_000);
        assert!(bars.iter().all(Bar::is_sane));
        assert!(bars.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
        assert!(bars.windows(2).all(|w| w[1].open == w[0].close));
    }

    #[test]
    fn rejects_parameters_that_would_break_sampling() {
        assert!(SyntheticFeed::new(1.1, 0.0008, -0.0004).is_err());
        assert!(SyntheticFeed::new(1.1, 0.0008, f64::NAN).is_err());
        assert!(SyntheticFeed::new(1.1, -0.0008, 0.0004).is_err());
        assert!(SyntheticFeed::new(1.1, f64::INFINITY, 0.0004).is_err());
        assert!(SyntheticFeed::new(0.0, 0.0008, 0.0004).is_err());
        assert!(SyntheticFeed::default()
            .with_interval(Duration::zero())
            .is_err());
    }

    #[test]
    fn flat_feed_from_checked_parameters_generates() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let feed = SyntheticFeed::new(1.25, 0.0, 0.0)
            .unwrap()
            .with_start(start)
            .with_interval(Duration::minutes(15))
            .unwrap()
            .with_regime_length(0);
        let bars = feed.generate(200, 3);
        assert_eq!(bars[0].timestamp, start);
        assert_eq!(bars[1].timestamp - bars[0].timestamp, Duration::minutes(15));
        assert!(bars.iter().all(Bar::is_sane));
        assert!(bars.iter().all(|b| b.close == 1.25));
    }
}
