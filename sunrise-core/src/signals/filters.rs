//! Secondary entry filters.
//!
//! Pure predicates over the current snapshot and the confirm-angle history.
//! A NaN input never passes: it yields `FilterVerdict::Degenerate`.
//!
//! The ATR-change filter compares the ATR on the entry bar with the ATR
//! recorded when the trigger fired. Strategies pass that value in through
//! [`EntryFilters::evaluate_since`].

use super::SignalContext;
use crate::config::{AtrChangeSettings, EmaOrderMode, FilterSettings, StrategyConfig};
use crate::indicators::{EmaLine, IndicatorSnapshot};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    EmaOrder,
    Baseline,
    AnglePersistence,
    Divergence,
    AtrBand,
    AtrChange,
    Session,
}

/// Outcome of the filter chain, naming the first filter that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterVerdict {
    Passed,
    Rejected(FilterKind),
    /// A required indicator value was NaN.
    Degenerate(FilterKind),
}

impl FilterVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, FilterVerdict::Passed)
    }
}

/// `Some(pass)` when every input is defined, `None` otherwise.
type Check = Option<bool>;

fn finite(vals: &[f64]) -> bool {
    vals.iter().all(|v| v.is_finite())
}

pub fn ema_order(snap: &IndicatorSnapshot, mode: EmaOrderMode) -> Check {
    let c = snap.ema(EmaLine::Confirm);
    let f = snap.ema(EmaLine::Fast);
    let m = snap.ema(EmaLine::Medium);
    let s = snap.ema(EmaLine::Slow);
    if !finite(&[c, f, m, s]) {
        return None;
    }
    Some(match mode {
        EmaOrderMode::ConfirmAboveAll => c > f && c > m && c > s,
        EmaOrderMode::FastMediumSlow => f > m && m > s,
        EmaOrderMode::Full => c > f && f > m && m > s,
    })
}

pub fn baseline(close: f64, snap: &IndicatorSnapshot) -> Check {
    let b = snap.ema(EmaLine::Baseline);
    finite(&[close, b]).then_some(close > b)
}

/// Confirm angle strictly above `min_degrees`, and at most `max_degrees`
/// when set, on each of the last `bars` bars.
pub fn angle_persistence(
    history: &VecDeque<f64>,
    bars: usize,
    min_degrees: f64,
    max_degrees: Option<f64>,
) -> Check {
    if history.len() < bars {
        return None;
    }
    let recent = history.iter().skip(history.len() - bars);
    let mut all_inside = true;
    for &a in recent {
        if !a.is_finite() {
            return None;
        }
        all_inside &= a > min_degrees && max_degrees.map_or(true, |max| a <= max);
    }
    Some(all_inside)
}

/// Fast/medium and medium/slow angle spreads strictly below their maxima.
pub fn divergence(snap: &IndicatorSnapshot, max_fm: f64, max_ms: f64) -> Check {
    let f = snap.angle(EmaLine::Fast);
    let m = snap.angle(EmaLine::Medium);
    let s = snap.angle(EmaLine::Slow);
    if !finite(&[f, m, s]) {
        return None;
    }
    Some((f - m).abs() < max_fm && (m - s).abs() < max_ms)
}

pub fn atr_band(atr: f64, min: f64, max: f64) -> Check {
    atr.is_finite().then_some(atr >= min && atr <= max)
}

/// ATR change since the trigger bar, `atr - signal_atr`.
///
/// A rise must fall inside the increment range, and is refused outright when
/// the increment range is off. A fall must fall inside the decrement range
/// when that range is on, and passes otherwise. No change always passes.
pub fn atr_change(signal_atr: f64, atr: f64, cfg: &AtrChangeSettings) -> Check {
    if !finite(&[signal_atr, atr]) {
        return None;
    }
    let change = atr - signal_atr;
    Some(if change > 0.0 {
        cfg.increment_enabled && change >= cfg.increment_min && change <= cfg.increment_max
    } else if change < 0.0 {
        !cfg.decrement_enabled || (change >= cfg.decrement_min && change <= cfg.decrement_max)
    } else {
        true
    })
}

/// `[start, end)` in UTC time of day. `start > end` wraps midnight;
/// `start == end` means the session never closes.
pub fn in_session(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    // Compare at minute resolution; bars are stamped on whole minutes.
    let minute = |x: NaiveTime| x.hour() * 60 + x.minute();
    let (t, start, end) = (minute(t), minute(start), minute(end));
    if start == end {
        true
    } else if start < end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

/// The configured filter chain. Evaluated in a fixed order; the first
/// failure wins.
#[derive(Debug, Clone)]
pub struct EntryFilters {
    settings: FilterSettings,
    min_degrees: f64,
    max_degrees: Option<f64>,
    persistence_bars: usize,
}

impl EntryFilters {
    pub fn new(settings: FilterSettings, min_degrees: f64, persistence_bars: usize) -> Self {
        Self {
            settings,
            min_degrees,
            max_degrees: None,
            persistence_bars: persistence_bars.max(1),
        }
    }

    /// Upper bound on the confirm angle. `None` leaves it unbounded.
    pub fn with_max_degrees(mut self, max_degrees: Option<f64>) -> Self {
        self.max_degrees = max_degrees;
        self
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(
            cfg.filters.clone(),
            cfg.angle.min_degrees,
            cfg.angle.persistence_bars,
        )
        .with_max_degrees(cfg.angle.max_degrees)
    }

    /// Filter chain with every filter switched off.
    pub fn disabled() -> Self {
        let settings = FilterSettings {
            ema_order_enabled: false,
            baseline_enabled: false,
            angle_enabled: false,
            divergence_enabled: false,
            atr_band_enabled: false,
            session_enabled: false,
            atr_change: AtrChangeSettings {
                enabled: false,
                ..AtrChangeSettings::default()
            },
            ..FilterSettings::default()
        };
        Self::new(settings, 0.0, 1)
    }

    /// Evaluate with the entry bar as its own trigger bar, so the ATR
    /// change is zero.
    pub fn evaluate(&self, ctx: &SignalContext<'_>) -> FilterVerdict {
        self.evaluate_since(ctx, ctx.current.atr)
    }

    /// Evaluate against the ATR recorded when the trigger fired.
    pub fn evaluate_since(&self, ctx: &SignalContext<'_>, signal_atr: f64) -> FilterVerdict {
        let s = &self.settings;
        let snap = ctx.current;

        let checks = [
            (s.ema_order_enabled, FilterKind::EmaOrder, ema_order(snap, s.ema_order)),
            (s.baseline_enabled, FilterKind::Baseline, baseline(ctx.bar.close, snap)),
            (
                s.angle_enabled,
                FilterKind::AnglePersistence,
                angle_persistence(
                    ctx.confirm_angles,
                    self.persistence_bars,
                    self.min_degrees,
                    self.max_degrees,
                ),
            ),
            (
                s.divergence_enabled,
                FilterKind::Divergence,
                divergence(snap, s.max_divergence_fm, s.max_divergence_ms),
            ),
            (s.atr_band_enabled, FilterKind::AtrBand, atr_band(snap.atr, s.atr_min, s.atr_max)),
            (
                s.atr_change.enabled,
                FilterKind::AtrChange,
                atr_change(signal_atr, snap.atr, &s.atr_change),
            ),
            (
                s.session_enabled,
                FilterKind::Session,
                Some(in_session(ctx.bar.timestamp.time(), s.session_start, s.session_end)),
            ),
        ];

        for (enabled, kind, check) in checks {
            if !enabled {
                continue;
            }
            match check {
                Some(true) => {}
                Some(false) => return FilterVerdict::Rejected(kind),
                None => return FilterVerdict::Degenerate(kind),
            }
        }
        FilterVerdict::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::*;

    fn ctx<'a>(
        bar: &'a crate::domain::Bar,
        snap: &'a IndicatorSnapshot,
        history: &'a VecDeque<f64>,
    ) -> SignalContext<'a> {
        SignalContext {
            index: 0,
            bar,
            prev_bar: None,
            current: snap,
            previous: snap,
            confirm_angles: history,
        }
    }

    #[test]
    fn ema_order_modes() {
        let mut snap = flat_snapshot(1.0, 0.0);
        snap.set_ema(EmaLine::Confirm, 1.4);
        snap.set_ema(EmaLine::Fast, 1.3);
        snap.set_ema(EmaLine::Medium, 1.2);
        snap.set_ema(EmaLine::Slow, 1.1);
        assert_eq!(ema_order(&snap, EmaOrderMode::Full), Some(true));

        snap.set_ema(EmaLine::Medium, 1.35);
        assert_eq!(ema_order(&snap, EmaOrderMode::ConfirmAboveAll), Some(true));
        assert_eq!(ema_order(&snap, EmaOrderMode::FastMediumSlow), Some(false));
        assert_eq!(ema_order(&snap, EmaOrderMode::Full), Some(false));

        snap.set_ema(EmaLine::Slow, f64::NAN);
        assert_eq!(ema_order(&snap, EmaOrderMode::ConfirmAboveAll), None);
    }

    #[test]
    fn angle_persistence_needs_every_recent_bar() {
        let history = VecDeque::from(vec![10.0, 80.0, 81.0, 79.0]);
        assert_eq!(angle_persistence(&history, 3, 75.0, None), Some(true));
        assert_eq!(angle_persistence(&history, 4, 75.0, None), Some(false));
        assert_eq!(angle_persistence(&history, 5, 75.0, None), None);

        let with_nan = VecDeque::from(vec![f64::NAN, 80.0]);
        assert_eq!(angle_persistence(&with_nan, 2, 75.0, None), None);
        assert_eq!(angle_persistence(&with_nan, 1, 75.0, None), Some(true));
    }

    #[test]
    fn angle_above_max_is_too_steep() {
        let history = VecDeque::from(vec![80.0, 84.0, 85.0]);
        assert_eq!(angle_persistence(&history, 3, 75.0, Some(85.0)), Some(true));
        assert_eq!(angle_persistence(&history, 3, 75.0, Some(84.5)), Some(false));

        let steep = VecDeque::from(vec![80.0, 88.0]);
        assert_eq!(angle_persistence(&steep, 1, 75.0, Some(85.0)), Some(false));
        assert_eq!(angle_persistence(&steep, 1, 75.0, None), Some(true));
    }

    #[test]
    fn chain_rejects_steep_angle_when_max_is_set() {
        let (_, snap) = crossing_pair();
        let bar = bullish();
        let history = VecDeque::from(vec![80.0, 89.0]);

        let mut cfg = StrategyConfig::default();
        cfg.angle.persistence_bars = 2;
        assert!(EntryFilters::from_config(&cfg).evaluate(&ctx(&bar, &snap, &history)).passed());

        cfg.angle.max_degrees = Some(85.0);
        assert_eq!(
            EntryFilters::from_config(&cfg).evaluate(&ctx(&bar, &snap, &history)),
            FilterVerdict::Rejected(FilterKind::AnglePersistence)
        );
    }

    fn atr_ranges(increment: bool, decrement: bool) -> AtrChangeSettings {
        AtrChangeSettings {
            enabled: true,
            increment_enabled: increment,
            increment_min: 0.00001,
            increment_max: 0.00020,
            decrement_enabled: decrement,
            decrement_min: -0.00005,
            decrement_max: -0.000001,
        }
    }

    #[test]
    fn atr_rise_needs_the_increment_range() {
        let on = atr_ranges(true, true);
        assert_eq!(atr_change(0.0010, 0.0011, &on), Some(true));
        assert_eq!(atr_change(0.0010, 0.0013, &on), Some(false));
        assert_eq!(atr_change(0.0010, 0.001005, &on), Some(false));

        // Increment range off: every rise is refused.
        let off = atr_ranges(false, true);
        assert_eq!(atr_change(0.0010, 0.0011, &off), Some(false));
    }

    #[test]
    fn atr_fall_checked_only_when_decrement_range_is_on() {
        let on = atr_ranges(false, true);
        assert_eq!(atr_change(0.0010, 0.00098, &on), Some(true));
        assert_eq!(atr_change(0.0010, 0.00090, &on), Some(false));

        let off = atr_ranges(false, false);
        assert_eq!(atr_change(0.0010, 0.00090, &off), Some(true));

        assert_eq!(atr_change(0.0010, 0.0010, &on), Some(true));
        assert_eq!(atr_change(f64::NAN, 0.0010, &on), None);
    }

    #[test]
    fn chain_measures_atr_change_from_the_signal_bar() {
        let (_, mut snap) = crossing_pair();
        snap.atr = 0.0013;
        let bar = bullish();
        let history = VecDeque::from(vec![80.0, 80.0]);

        let mut cfg = StrategyConfig::default();
        cfg.filters.atr_change = atr_ranges(true, true);
        let filters = EntryFilters::from_config(&cfg);
        let c = ctx(&bar, &snap, &history);

        // Same bar: no change.
        assert!(filters.evaluate(&c).passed());
        assert!(filters.evaluate_since(&c, 0.0012).passed());
        assert_eq!(
            filters.evaluate_since(&c, 0.0010),
            FilterVerdict::Rejected(FilterKind::AtrChange)
        );
        assert_eq!(
            filters.evaluate_since(&c, f64::NAN),
            FilterVerdict::Degenerate(FilterKind::AtrChange)
        );
    }

    #[test]
    fn divergence_is_strict() {
        let mut snap = flat_snapshot(1.0, 50.0);
        snap.set_angle(EmaLine::Fast, 53.0);
        // |53 - 50| == 3 is not < 3
        assert_eq!(divergence(&snap, 3.0, 6.0), Some(false));
        snap.set_angle(EmaLine::Fast, 52.5);
        assert_eq!(divergence(&snap, 3.0, 6.0), Some(true));
        snap.set_angle(EmaLine::Slow, 40.0);
        assert_eq!(divergence(&snap, 3.0, 6.0), Some(false));
    }

    #[test]
    fn session_window_wraps_midnight() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(in_session(t(9, 0), t(8, 0), t(17, 0)));
        assert!(!in_session(t(17, 0), t(8, 0), t(17, 0)));
        assert!(in_session(t(23, 30), t(22, 0), t(6, 0)));
        assert!(in_session(t(5, 59), t(22, 0), t(6, 0)));
        assert!(!in_session(t(12, 0), t(22, 0), t(6, 0)));
        assert!(in_session(t(12, 0), t(0, 0), t(0, 0)));
    }

    #[test]
    fn chain_reports_first_failure() {
        let (_, snap) = crossing_pair();
        let bar = bullish();
        let history = VecDeque::from(vec![80.0, 80.0]);

        let mut cfg = StrategyConfig::default();
        cfg.angle.persistence_bars = 2;
        let filters = EntryFilters::from_config(&cfg);
        assert_eq!(filters.evaluate(&ctx(&bar, &snap, &history)), FilterVerdict::Passed);

        let low_angles = VecDeque::from(vec![80.0, 70.0]);
        assert_eq!(
            filters.evaluate(&ctx(&bar, &snap, &low_angles)),
            FilterVerdict::Rejected(FilterKind::AnglePersistence)
        );

        let mut below_baseline = snap;
        below_baseline.set_ema(EmaLine::Baseline, 1.2);
        assert_eq!(
            filters.evaluate(&ctx(&bar, &below_baseline, &low_angles)),
            FilterVerdict::Rejected(FilterKind::Baseline)
        );
    }

    #[test]
    fn nan_atr_is_degenerate_not_panic() {
        let (_, mut snap) = crossing_pair();
        snap.atr = f64::NAN;
        let bar = bullish();
        let history = VecDeque::from(vec![80.0]);

        let mut cfg = StrategyConfig::default();
        cfg.filters.atr_band_enabled = true;
        cfg.angle.persistence_bars = 1;
        let filters = EntryFilters::from_config(&cfg);
        assert_eq!(
            filters.evaluate(&ctx(&bar, &snap, &history)),
            FilterVerdict::Degenerate(FilterKind::AtrBand)
        );
    }

    #[test]
    fn disabled_chain_always_passes() {
        let snap = IndicatorSnapshot::default();
        let bar = bearish();
        let history = VecDeque::new();
        assert!(EntryFilters::disabled().evaluate(&ctx(&bar, &snap, &history)).passed());
    }
}
