//! End-to-end backtests over the synthetic feed.
//!
//! Tests:
//! 1. Accounting identities hold for default and permissive configurations
//! 2. Determinism: same seed and config, same result
//! 3. Config files drive the run exactly like in-memory configs
//! 4. Malformed bars are skipped and counted

mod common;

use common::scenario_config;
use std::io::Write;
use sunrise_core::config::StrategyConfig;
use sunrise_core::engine::{run_backtest, RunResult, SkipReason};
use sunrise_core::synthetic::synthetic_bars;

fn permissive() -> StrategyConfig {
    let mut cfg = scenario_config();
    cfg.exits.cooldown_bars = 0;
    cfg.exits.max_hold_bars = 30;
    cfg
}

fn check_identities(result: &RunResult, initial_equity: f64) {
    let summary = &result.summary;
    assert_eq!(summary.trade_count, result.trades.len());
    assert_eq!(result.diagnostics.exits as usize, result.trades.len());

    let open = usize::from(result.open_position.is_some());
    assert_eq!(result.diagnostics.entries as usize, result.trades.len() + open);

    let net: f64 = result.trades.iter().map(|t| t.pnl_after_cost).sum();
    assert!((result.final_equity - (initial_equity + net)).abs() < 1e-6);
    assert!((summary.net_pnl - net).abs() < 1e-6);

    let histogram: usize = summary.exit_reasons.values().sum();
    assert_eq!(histogram, result.trades.len());

    for pair in result.trades.windows(2) {
        // No re-entry on the exit bar.
        assert!(pair[1].entry_ts > pair[0].exit_ts);
    }
    for t in &result.trades {
        assert!(t.exit_ts > t.entry_ts);
        assert!(t.size >= 1);
        assert!(t.bars_held >= 1);
    }
}

// ── 1. Identities ──

#[test]
fn default_config_identities() {
    let cfg = StrategyConfig::default();
    let bars = synthetic_bars(5_000, 11);
    let result = run_backtest(&bars, &cfg).unwrap();
    assert_eq!(result.bar_count, 5_000);
    assert_eq!(result.equity_curve.len(), 5_000);
    check_identities(&result, cfg.risk.initial_equity);
}

#[test]
fn permissive_config_trades_and_balances() {
    let cfg = permissive();
    let result = run_backtest(&synthetic_bars(3_000, 5), &cfg).unwrap();
    assert!(!result.trades.is_empty());
    check_identities(&result, cfg.risk.initial_equity);
    assert!(result.diagnostics.skipped(SkipReason::InsufficientHistory) > 0);
}

// ── 2. Determinism ──

#[test]
fn same_seed_same_result() {
    let cfg = permissive();
    let a = run_backtest(&synthetic_bars(2_000, 99), &cfg).unwrap();
    let b = run_backtest(&synthetic_bars(2_000, 99), &cfg).unwrap();
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.diagnostics, b.diagnostics);
    assert_eq!(a.config_hash, b.config_hash);
}

// ── 3. Config files ──

#[test]
fn config_file_round_trip_drives_identical_run() {
    let cfg = permissive();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", cfg.to_toml_string().unwrap()).unwrap();

    let loaded = StrategyConfig::from_path(file.path()).unwrap();
    assert_eq!(loaded, cfg);
    assert_eq!(loaded.config_hash().unwrap(), cfg.config_hash().unwrap());

    let bars = synthetic_bars(1_500, 3);
    let from_file = run_backtest(&bars, &loaded).unwrap();
    let in_memory = run_backtest(&bars, &cfg).unwrap();
    assert_eq!(from_file.trades, in_memory.trades);
}

#[test]
fn run_result_serializes() {
    let result = run_backtest(&synthetic_bars(1_000, 8), &permissive()).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: RunResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.trades.len(), result.trades.len());
    assert_eq!(back.config_hash, result.config_hash);
}

// ── 4. Malformed input ──

#[test]
fn malformed_bars_are_skipped_and_counted() {
    let mut bars = synthetic_bars(400, 21);
    let mut nan_bar = bars[100].clone();
    nan_bar.close = f64::NAN;
    let duplicate = bars[200].clone();
    bars.insert(101, nan_bar);
    bars.insert(202, duplicate);

    let result = run_backtest(&bars, &permissive()).unwrap();
    assert_eq!(result.bar_count, 402);
    assert_eq!(result.diagnostics.skipped(SkipReason::MalformedBar), 2);
    assert_eq!(result.diagnostics.bars_processed, 400);
    assert_eq!(result.equity_curve.len(), 400);
}
