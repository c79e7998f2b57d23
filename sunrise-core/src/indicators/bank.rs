//! IndicatorBank: every streaming indicator the strategy reads, updated once per bar.
//!
//! Lines are named by the `EmaLine` enum and stored in fixed arrays indexed by
//! it, so a lookup can never miss. Each line has an EMA over the median price
//! and an angle tracker over that EMA. ATR is computed from the raw bar.

use super::angle::AngleTracker;
use super::atr::Atr;
use super::ema::Ema;
use crate::config::{AngleSettings, IndicatorSettings};
use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Every EMA line the strategy can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmaLine {
    Fast,
    Medium,
    Slow,
    Confirm,
    Baseline,
    ExitPrimary,
    ExitSecondary,
}

impl EmaLine {
    pub const COUNT: usize = 7;

    pub const ALL: [EmaLine; EmaLine::COUNT] = [
        EmaLine::Fast,
        EmaLine::Medium,
        EmaLine::Slow,
        EmaLine::Confirm,
        EmaLine::Baseline,
        EmaLine::ExitPrimary,
        EmaLine::ExitSecondary,
    ];

    /// The three trend lines the confirm EMA is compared against.
    pub const TREND: [EmaLine; 3] = [EmaLine::Fast, EmaLine::Medium, EmaLine::Slow];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EmaLine::Fast => "fast",
            EmaLine::Medium => "medium",
            EmaLine::Slow => "slow",
            EmaLine::Confirm => "confirm",
            EmaLine::Baseline => "baseline",
            EmaLine::ExitPrimary => "exit_primary",
            EmaLine::ExitSecondary => "exit_secondary",
        }
    }
}

/// Indicator values as of one bar. NaN means "not ready".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    ema: [f64; EmaLine::COUNT],
    angle: [f64; EmaLine::COUNT],
    pub atr: f64,
}

impl Default for IndicatorSnapshot {
    fn default() -> Self {
        Self {
            ema: [f64::NAN; EmaLine::COUNT],
            angle: [f64::NAN; EmaLine::COUNT],
            atr: f64::NAN,
        }
    }
}

impl IndicatorSnapshot {
    pub fn ema(&self, line: EmaLine) -> f64 {
        self.ema[line.index()]
    }

    pub fn angle(&self, line: EmaLine) -> f64 {
        self.angle[line.index()]
    }

    /// EMA value, or `None` while the line is warming up.
    pub fn ema_opt(&self, line: EmaLine) -> Option<f64> {
        let v = self.ema(line);
        v.is_finite().then_some(v)
    }

    pub fn angle_opt(&self, line: EmaLine) -> Option<f64> {
        let v = self.angle(line);
        v.is_finite().then_some(v)
    }

    pub fn atr_opt(&self) -> Option<f64> {
        self.atr.is_finite().then_some(self.atr)
    }

    pub fn emas_ready(&self) -> bool {
        self.ema.iter().all(|v| v.is_finite())
    }

    /// Build a snapshot from explicit values, indexed by `EmaLine::index`.
    pub fn from_parts(ema: [f64; EmaLine::COUNT], angle: [f64; EmaLine::COUNT], atr: f64) -> Self {
        Self { ema, angle, atr }
    }

    pub fn set_ema(&mut self, line: EmaLine, value: f64) {
        self.ema[line.index()] = value;
    }

    pub fn set_angle(&mut self, line: EmaLine, value: f64) {
        self.angle[line.index()] = value;
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorBank {
    emas: [Ema; EmaLine::COUNT],
    angles: [AngleTracker; EmaLine::COUNT],
    atr: Atr,
    current: IndicatorSnapshot,
    previous: IndicatorSnapshot,
    /// Confirm-EMA angles, newest at the back.
    confirm_angles: VecDeque<f64>,
    history_len: usize,
    bars_seen: usize,
}

impl IndicatorBank {
    pub fn new(indicators: &IndicatorSettings, angle: &AngleSettings) -> Self {
        let history_len = angle.persistence_bars.max(1);
        Self {
            emas: std::array::from_fn(|i| Ema::new(indicators.ema_period(EmaLine::ALL[i]))),
            angles: std::array::from_fn(|_| AngleTracker::new(angle.lookback, angle.scale)),
            atr: Atr::new(indicators.atr_period),
            current: IndicatorSnapshot::default(),
            previous: IndicatorSnapshot::default(),
            confirm_angles: VecDeque::with_capacity(history_len),
            history_len,
            bars_seen: 0,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> &IndicatorSnapshot {
        let price = bar.median_price();
        let mut next = IndicatorSnapshot::default();

        for line in EmaLine::ALL {
            let i = line.index();
            let ema = self.emas[i].update(price);
            next.ema[i] = ema;
            next.angle[i] = self.angles[i].update(ema);
        }
        next.atr = self.atr.update(bar);

        if self.confirm_angles.len() == self.history_len {
            self.confirm_angles.pop_front();
        }
        self.confirm_angles.push_back(next.angle(EmaLine::Confirm));

        self.previous = std::mem::replace(&mut self.current, next);
        self.bars_seen += 1;
        &self.current
    }

    pub fn current(&self) -> &IndicatorSnapshot {
        &self.current
    }

    pub fn previous(&self) -> &IndicatorSnapshot {
        &self.previous
    }

    pub fn confirm_angle_history(&self) -> &VecDeque<f64> {
        &self.confirm_angles
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// True once every EMA (current and previous bar), the trend-line angles
    /// and the ATR are defined.
    pub fn is_warm(&self) -> bool {
        self.current.emas_ready()
            && self.previous.emas_ready()
            && self.current.atr.is_finite()
            && EmaLine::TREND
                .iter()
                .chain(std::iter::once(&EmaLine::Confirm))
                .all(|&line| self.current.angle(line).is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::indicators::{assert_approx, make_bars};

    fn small_config() -> StrategyConfig {
        let mut cfg = StrategyConfig::default();
        cfg.indicators.ema_fast = 2;
        cfg.indicators.ema_medium = 3;
        cfg.indicators.ema_slow = 4;
        cfg.indicators.ema_confirm = 1;
        cfg.indicators.ema_baseline = 5;
        cfg.indicators.ema_exit_primary = 3;
        cfg.indicators.ema_exit_secondary = 4;
        cfg.indicators.atr_period = 3;
        cfg.angle.lookback = 2;
        cfg.angle.persistence_bars = 3;
        cfg
    }

    #[test]
    fn line_indices_are_dense() {
        for (i, line) in EmaLine::ALL.iter().enumerate() {
            assert_eq!(line.index(), i);
        }
    }

    #[test]
    fn confirm_period_one_tracks_median_price() {
        let cfg = small_config();
        let mut bank = IndicatorBank::new(&cfg.indicators, &cfg.angle);
        for bar in make_bars(&[1.10, 1.12, 1.11]) {
            let snap = *bank.update(&bar);
            assert_approx(snap.ema(EmaLine::Confirm), bar.median_price(), 1e-12);
        }
    }

    #[test]
    fn warms_up_and_keeps_previous_snapshot() {
        let cfg = small_config();
        let mut bank = IndicatorBank::new(&cfg.indicators, &cfg.angle);
        let bars = make_bars(&[1.10, 1.11, 1.12, 1.13, 1.14, 1.15, 1.16, 1.17]);

        bank.update(&bars[0]);
        assert!(!bank.is_warm());
        assert!(bank.current().ema_opt(EmaLine::Baseline).is_none());

        let mut last = IndicatorSnapshot::default();
        for bar in &bars[1..] {
            last = *bank.current();
            bank.update(bar);
        }
        assert!(bank.is_warm());
        assert_eq!(bank.previous(), &last);
        assert_eq!(bank.bars_seen(), bars.len());
    }

    #[test]
    fn confirm_angle_history_is_bounded() {
        let cfg = small_config();
        let mut bank = IndicatorBank::new(&cfg.indicators, &cfg.angle);
        for bar in make_bars(&[1.10, 1.11, 1.12, 1.13, 1.14, 1.15]) {
            bank.update(&bar);
        }
        let history = bank.confirm_angle_history();
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.back().copied().map(f64::to_bits),
            Some(bank.current().angle(EmaLine::Confirm).to_bits())
        );
    }
}
