//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period), seeded with the mean of the
//! first `period` true ranges. The first bar has no previous close and does not
//! contribute, so the first value appears on bar `period + 1`.

use crate::domain::Bar;

/// Streaming Wilder ATR.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    tr_sum: f64,
    tr_count: usize,
    value: f64,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            tr_sum: 0.0,
            tr_count: 0,
            value: f64::NAN,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, bar: &Bar) -> f64 {
        let prev_close = match self.prev_close.replace(bar.close) {
            Some(pc) => pc,
            None => return f64::NAN,
        };

        let tr = true_range(bar.high, bar.low, prev_close);
        self.tr_count += 1;

        if self.tr_count < self.period {
            self.tr_sum += tr;
            return f64::NAN;
        }
        if self.tr_count == self.period {
            self.tr_sum += tr;
            self.value = self.tr_sum / self.period as f64;
            return self.value;
        }

        let alpha = 1.0 / self.period as f64;
        self.value = alpha * tr + (1.0 - alpha) * self.value;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_finite()
    }
}

pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Batch Wilder smoothing over a series. Alpha = 1/period.
/// Seed: mean of the first `period` values starting at `start`.
pub fn wilder_smooth(values: &[f64], period: usize, start: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < start + period {
        return result;
    }

    let seed_end = start + period;
    let seed: f64 = values[start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}
