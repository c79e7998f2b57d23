//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use sunrise_core::config::{CrossoverExit, FilterSettings, StrategyConfig, StrategyKind};
use sunrise_core::domain::Bar;

/// Hourly bars from explicit (open, high, low, close) rows.
pub fn ohlc_bars(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::new(base + Duration::hours(i as i64), o, h, l, c, 1_000.0))
        .collect()
}

/// Short periods, crossover entry, no secondary filters, no crossover exit.
/// With `entry_scenario()` the entry fires on bar `ENTRY_BAR`.
pub fn scenario_config() -> StrategyConfig {
    let mut cfg = StrategyConfig::default();
    cfg.strategy.kind = StrategyKind::DirectCrossover;
    cfg.indicators.ema_fast = 3;
    cfg.indicators.ema_medium = 4;
    cfg.indicators.ema_slow = 5;
    cfg.indicators.ema_baseline = 6;
    cfg.indicators.ema_exit_primary = 5;
    cfg.indicators.ema_exit_secondary = 6;
    cfg.indicators.atr_period = 3;
    cfg.angle.lookback = 2;
    cfg.filters = FilterSettings {
        ema_order_enabled: false,
        baseline_enabled: false,
        angle_enabled: false,
        ..FilterSettings::default()
    };
    cfg.exits.crossover_exit = CrossoverExit::Off;
    cfg.exits.sl_multiplier = 1.0;
    cfg.exits.trail_multiplier = 1.0;
    cfg.exits.max_hold_bars = 50;
    cfg.risk.risk_fraction = 0.05;
    cfg
}

pub const ENTRY_BAR: usize = 11;

/// Ten bars of down-drift, a small bullish bar still under every EMA, then a
/// large bullish bar whose median price crosses fast/medium/slow (entry).
/// Entry close 1.0990, entry low 1.0952. The bar after is bullish, so the
/// trailing stop rises on it.
pub fn entry_scenario() -> Vec<(f64, f64, f64, f64)> {
    let mut rows: Vec<(f64, f64, f64, f64)> = (0..10)
        .map(|i| {
            let c = 1.1000 - i as f64 * 0.0005;
            (c + 0.0004, c + 0.0006, c - 0.0002, c)
        })
        .collect();
    rows.push((1.0950, 1.0954, 1.0949, 1.0953));
    rows.push((1.0953, 1.0995, 1.0952, 1.0990));
    rows.push((1.0990, 1.1000, 1.0985, 1.0995));
    rows
}

/// A bar that drops through every plausible stop level.
pub const CRASH: (f64, f64, f64, f64) = (1.0990, 1.0992, 1.0900, 1.0910);

/// A quiet inside bar that touches nothing.
pub const QUIET: (f64, f64, f64, f64) = (1.0995, 1.0998, 1.0993, 1.0994);
