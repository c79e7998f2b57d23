//! Trade ledger: the sink for closed trades.
//!
//! The engine emits each `ClosedTrade` exactly once; a ledger stores or
//! forwards it. `MemoryLedger` keeps everything for summary statistics,
//! `JsonLinesLedger` writes one JSON object per line to any writer.

use crate::domain::{ClosedTrade, ExitReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("trade serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait TradeLedger: Send {
    fn record(&mut self, trade: &ClosedTrade) -> Result<(), LedgerError>;
}

// ── In-memory ──

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    trades: Vec<ClosedTrade>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trade. Infallible; the `TradeLedger` impl forwards here.
    pub fn push(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<ClosedTrade> {
        self.trades
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::from_trades(&self.trades)
    }
}

impl TradeLedger for MemoryLedger {
    fn record(&mut self, trade: &ClosedTrade) -> Result<(), LedgerError> {
        self.push(trade.clone());
        Ok(())
    }
}

// ── JSON lines ──

pub struct JsonLinesLedger<W: Write + Send> {
    writer: W,
    written: usize,
}

impl<W: Write + Send> JsonLinesLedger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TradeLedger for JsonLinesLedger<W> {
    fn record(&mut self, trade: &ClosedTrade) -> Result<(), LedgerError> {
        serde_json::to_writer(&mut self.writer, trade)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

// ── Summary ──

/// Aggregate statistics over a set of closed trades. Winners and losers are
/// judged on net PnL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    /// 0.0 when there are no trades.
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub total_costs: f64,
    /// Sum of winning net PnL over the absolute sum of losing net PnL.
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub avg_bars_held: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
}

impl LedgerSummary {
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let n = trades.len();
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let losers = trades.iter().filter(|t| t.pnl_after_cost < 0.0).count();

        let gross_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let net_pnl: f64 = trades.iter().map(|t| t.pnl_after_cost).sum();
        let won: f64 = trades
            .iter()
            .map(|t| t.pnl_after_cost)
            .filter(|p| *p > 0.0)
            .sum();
        let lost: f64 = trades
            .iter()
            .map(|t| t.pnl_after_cost)
            .filter(|p| *p < 0.0)
            .sum::<f64>()
            .abs();

        let mut exit_reasons = BTreeMap::new();
        for t in trades {
            *exit_reasons.entry(t.exit_reason).or_insert(0) += 1;
        }

        Self {
            trade_count: n,
            winners,
            losers,
            win_rate: winners as f64 / n as f64,
            gross_pnl,
            net_pnl,
            total_costs: gross_pnl - net_pnl,
            profit_factor: (lost > 0.0).then(|| won / lost),
            avg_bars_held: trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / n as f64,
            exit_reasons,
        }
    }
}
