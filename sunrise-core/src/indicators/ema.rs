//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1).
//! Seed: the SMA of the first `period` samples.
//! Not ready (NaN) before `period` samples have been seen.

/// Streaming EMA, fed one sample per bar.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    seen: usize,
    value: f64,
}

impl Ema {
    /// `period` must be at least 1; config validation guarantees it.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: f64::NAN,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Push one sample and return the current value (NaN while warming up).
    ///
    /// A NaN sample taints the line for the rest of the run, matching
    /// `ema_of_series`.
    pub fn update(&mut self, x: f64) -> f64 {
        self.seen += 1;
        if self.seen < self.period {
            self.seed_sum += x;
            return f64::NAN;
        }
        if self.seen == self.period {
            self.seed_sum += x;
            self.value = self.seed_sum / self.period as f64;
            return self.value;
        }
        self.value = self.alpha * x + (1.0 - self.alpha) * self.value;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.seen >= self.period && self.value.is_finite()
    }
}

/// Batch EMA over a pre-extracted series.
/// Used to cross-check the streaming version.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let mut sum = 0.0;
    for &v in values.iter().take(period) {
        if v.is_nan() {
            return result;
        }
        sum += v;
    }
    let seed = sum / period as f64;
    result[period - 1] = seed;

    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_tracks_input() {
        let mut ema = Ema::new(1);
        assert_approx(ema.update(100.0), 100.0, DEFAULT_EPSILON);
        assert_approx(ema.update(200.0), 200.0, DEFAULT_EPSILON);
        assert!(ema.is_ready());
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seed = SMA(10, 11, 12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12, EMA[4] = 0.5*14 + 0.5*12 = 13
        let mut ema = Ema::new(3);
        assert!(ema.update(10.0).is_nan());
        assert!(ema.update(11.0).is_nan());
        assert!(!ema.is_ready());
        assert_approx(ema.update(12.0), 11.0, DEFAULT_EPSILON);
        assert_approx(ema.update(13.0), 12.0, DEFAULT_EPSILON);
        assert_approx(ema.update(14.0), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn streaming_matches_batch() {
        let xs: Vec<f64> = (0..40).map(|i| 1.1 + (i as f64 * 0.37).sin() * 0.01).collect();
        let batch = ema_of_series(&xs, 7);
        let mut ema = Ema::new(7);
        for (i, &x) in xs.iter().enumerate() {
            let v = ema.update(x);
            if batch[i].is_nan() {
                assert!(v.is_nan(), "index {i} should be warming up");
            } else {
                assert_approx(v, batch[i], DEFAULT_EPSILON);
            }
        }
    }

    #[test]
    fn batch_nan_in_seed_produces_all_nan() {
        let result = ema_of_series(&[10.0, f64::NAN, 12.0, 13.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_sample_taints_streaming_line() {
        let mut ema = Ema::new(2);
        ema.update(1.0);
        ema.update(2.0);
        assert!(ema.update(f64::NAN).is_nan());
        assert!(ema.update(3.0).is_nan());
        assert!(!ema.is_ready());
    }
}
