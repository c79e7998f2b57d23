//! Slope-to-angle transform.
//!
//! angle = atan2((ema[t] - ema[t-lookback+1]) * scale, lookback), in degrees.
//! The scale normalizes small per-bar deltas on 4-5 decimal quotes so one
//! minimum-degrees threshold works across instruments.

use std::collections::VecDeque;

/// Pure form of the transform over a window of `lookback` values,
/// oldest first. NaN if the window is short or contains NaN.
pub fn angle_degrees(window: &[f64], scale: f64) -> f64 {
    let lookback = window.len();
    if lookback < 2 {
        return f64::NAN;
    }
    let rise = (window[lookback - 1] - window[0]) * scale;
    let run = lookback as f64;
    rise.atan2(run).to_degrees()
}

/// Keeps the trailing `lookback` values of one EMA line.
#[derive(Debug, Clone)]
pub struct AngleTracker {
    lookback: usize,
    scale: f64,
    window: VecDeque<f64>,
}

impl AngleTracker {
    pub fn new(lookback: usize, scale: f64) -> Self {
        Self {
            lookback: lookback.max(2),
            scale,
            window: VecDeque::with_capacity(lookback.max(2)),
        }
    }

    /// Feed the latest EMA value. Warm-up NaNs are not buffered, so the angle
    /// becomes defined `lookback` bars after the EMA itself is ready.
    pub fn update(&mut self, ema_value: f64) -> f64 {
        if !ema_value.is_finite() {
            self.window.clear();
            return f64::NAN;
        }
        if self.window.len() == self.lookback {
            self.window.pop_front();
        }
        self.window.push_back(ema_value);
        self.value()
    }

    pub fn value(&self) -> f64 {
        if self.window.len() < self.lookback {
            return f64::NAN;
        }
        let first = self.window[0];
        let last = self.window[self.lookback - 1];
        let rise = (last - first) * self.scale;
        rise.atan2(self.lookback as f64).to_degrees()
    }
}
