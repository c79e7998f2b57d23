//! Backtest driver: feeds a bar series through `SimBroker` and the engine.
//!
//! Per bar:
//! 1. `broker.process_bar(bar)` matches working orders and returns events
//! 2. `engine.step(bar, &events)` decides
//! 3. `broker.submit(&outcome.commands)` applies the decisions
//!
//! Bars the engine would reject are not shown to the broker either, so queued
//! broker events wait for the next valid bar.

use super::diagnostics::Diagnostics;
use super::ledger::{LedgerSummary, MemoryLedger};
use super::step::{Engine, StepOutcome};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, ClosedTrade, ConfigHash, Position};
use crate::execution::SimBroker;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of a complete backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub config_hash: ConfigHash,
    pub strategy: String,
    /// Bars offered to the engine, including skipped malformed ones.
    pub bar_count: usize,
    pub trades: Vec<ClosedTrade>,
    pub summary: LedgerSummary,
    pub diagnostics: Diagnostics,
    /// Position still open after the last bar. Not force-closed.
    pub open_position: Option<Position>,
    /// Initial equity plus net realized PnL.
    pub final_equity: f64,
    /// Equity marked at each accepted bar's close.
    pub equity_curve: Vec<f64>,
}

pub fn run_backtest(bars: &[Bar], cfg: &StrategyConfig) -> Result<RunResult, ConfigError> {
    run_with_broker(bars, cfg, SimBroker::from_settings(&cfg.execution))
}

/// Run against a caller-prepared broker (e.g. with injected rejections).
pub fn run_with_broker(
    bars: &[Bar],
    cfg: &StrategyConfig,
    broker: SimBroker,
) -> Result<RunResult, ConfigError> {
    let mut runner = Runner::new(cfg, broker)?;
    for bar in bars {
        runner.feed(bar);
    }
    runner.finish()
}

/// Incremental form of [`run_backtest`] for callers that need to look at or
/// tamper with the broker between bars.
pub struct Runner {
    engine: Engine,
    broker: SimBroker,
    ledger: MemoryLedger,
    config_hash: ConfigHash,
    contract_unit: f64,
    bar_count: usize,
    equity_curve: Vec<f64>,
}

impl Runner {
    pub fn new(cfg: &StrategyConfig, broker: SimBroker) -> Result<Self, ConfigError> {
        let engine = Engine::new(cfg)?;
        Ok(Self {
            engine,
            broker,
            ledger: MemoryLedger::new(),
            config_hash: cfg.config_hash()?,
            contract_unit: cfg.risk.contract_unit,
            bar_count: 0,
            equity_curve: Vec::new(),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn broker(&self) -> &SimBroker {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut SimBroker {
        &mut self.broker
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        self.ledger.trades()
    }

    pub fn feed(&mut self, bar: &Bar) -> StepOutcome {
        self.bar_count += 1;
        if !self.engine.accepts(bar) {
            return self.engine.step(bar, &[]);
        }

        let events = self.broker.process_bar(bar);
        let outcome = self.engine.step(bar, &events);
        self.broker.submit(&outcome.commands);

        if let Some(trade) = &outcome.closed_trade {
            self.ledger.push(trade.clone());
        }

        let held = self.engine.position().map_or(0, |p| p.size);
        if held != self.broker.position_qty() {
            warn!(
                bar = outcome.index,
                engine = held,
                broker = self.broker.position_qty(),
                "engine and broker disagree on position size"
            );
        }

        let unrealized = self.engine.position().map_or(0.0, |p| {
            p.unrealized_points(bar.close) * p.size as f64 * self.contract_unit
        });
        self.equity_curve.push(self.engine.equity() + unrealized);
        outcome
    }

    pub fn finish(self) -> Result<RunResult, ConfigError> {
        let summary = self.ledger.summary();
        info!(
            bars = self.bar_count,
            trades = summary.trade_count,
            fills = self.broker.fill_count(),
            net_pnl = summary.net_pnl,
            "backtest complete"
        );
        Ok(RunResult {
            config_hash: self.config_hash,
            strategy: self.engine.strategy_name().to_string(),
            bar_count: self.bar_count,
            open_position: self.engine.position().cloned(),
            final_equity: self.engine.equity(),
            diagnostics: self.engine.diagnostics().clone(),
            trades: self.ledger.into_trades(),
            summary,
            equity_curve: self.equity_curve,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn flat_feed_produces_no_trades() {
        let closes = vec![1.1000; 200];
        let result = run_backtest(&make_bars(&closes), &StrategyConfig::default()).unwrap();
        assert_eq!(result.bar_count, 200);
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_none());
        assert_eq!(result.final_equity, 100_000.0);
        assert_eq!(result.equity_curve.len(), 200);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut cfg = StrategyConfig::default();
        cfg.risk.risk_fraction = 0.0;
        assert!(run_backtest(&[], &cfg).is_err());
    }

    #[test]
    fn result_carries_config_hash() {
        let cfg = StrategyConfig::default();
        let result = run_backtest(&make_bars(&[1.1, 1.2]), &cfg).unwrap();
        assert_eq!(result.config_hash, cfg.config_hash().unwrap());
        assert_eq!(result.strategy, "pullback_breakout");
    }
}
