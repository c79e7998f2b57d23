//! The per-bar engine step.
//!
//! `Engine::step(bar, broker_events)` is the single entry point. One call
//! processes one bar atomically:
//!
//! 1. Reject malformed or out-of-order bars without touching any state.
//! 2. Update the indicator bank.
//! 3. With a position open: count the bar, reconcile broker events (a
//!    protective fill wins), then bar-count, crossover and manual-close exits,
//!    then protection repair and the trailing stop. Exactly one exit per bar.
//! 4. Flat and no exit this bar: cooldown and warm-up gates, then advance the
//!    entry strategy; on a fired entry, plan, size and open the position.
//!
//! Per-bar problems never surface as errors. They are reported as a
//! [`SkipReason`] on the outcome and tallied in [`Diagnostics`].

use super::diagnostics::Diagnostics;
use crate::config::{ConfigError, CrossoverExit, ExitSettings, StrategyConfig};
use crate::domain::{Bar, BrokerEvent, ClosedTrade, ExitReason, OrderCommand, Position};
use crate::indicators::{EmaLine, IndicatorBank};
use crate::orders::{OrderLifecycleManager, Repair};
use crate::signals::{
    create_strategy, crossed_above, is_fresh_signal, EntryFilters, EntryStrategy, Phase,
    SignalContext, SignalOutcome,
};
use crate::sizers::{PositionSizer, RiskSizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Why a bar produced no trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Indicators are not warmed up yet.
    InsufficientHistory,
    /// The sizer returned fewer than one contract.
    InvalidSizing,
    /// ATR was undefined when an entry fired.
    NumericDegeneracy,
    /// Bar failed sanity checks or went back in time.
    MalformedBar,
    /// Inside the post-exit window.
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StepAction {
    /// Flat, nothing happened.
    Idle,
    Skipped(SkipReason),
    Entered { size: u64 },
    /// Position open and still held at the end of the bar.
    Holding,
    Exited(ExitReason),
}

/// Everything one `step` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Index of the bar among accepted bars. Malformed bars are not counted.
    pub index: usize,
    pub action: StepAction,
    /// Commands for the execution layer, in order.
    pub commands: Vec<OrderCommand>,
    pub closed_trade: Option<ClosedTrade>,
    /// What the entry strategy did, if it was advanced.
    pub signal: Option<SignalOutcome>,
    /// Strategy phase after the step.
    pub phase: Phase,
    pub conflicts: u32,
}

impl StepOutcome {
    fn new(index: usize, phase: Phase) -> Self {
        Self {
            index,
            action: StepAction::Idle,
            commands: Vec::new(),
            closed_trade: None,
            signal: None,
            phase,
            conflicts: 0,
        }
    }
}

pub struct Engine {
    exits: ExitSettings,
    initial_equity: f64,
    bank: IndicatorBank,
    strategy: Box<dyn EntryStrategy>,
    filters: EntryFilters,
    sizer: Box<dyn PositionSizer>,
    lifecycle: OrderLifecycleManager,
    index: usize,
    last_ts: Option<DateTime<Utc>>,
    prev_bar: Option<Bar>,
    last_exit_bar: Option<usize>,
    realized_pnl: f64,
    diagnostics: Diagnostics,
}

impl Engine {
    pub fn new(cfg: &StrategyConfig) -> Result<Self, ConfigError> {
        let strategy = create_strategy(cfg)?;
        Ok(Self {
            exits: cfg.exits.clone(),
            initial_equity: cfg.risk.initial_equity,
            bank: IndicatorBank::new(&cfg.indicators, &cfg.angle),
            strategy,
            filters: EntryFilters::from_config(cfg),
            sizer: Box::new(RiskSizer::from_settings(&cfg.risk)),
            lifecycle: OrderLifecycleManager::from_config(cfg),
            index: 0,
            last_ts: None,
            prev_bar: None,
            last_exit_bar: None,
            realized_pnl: 0.0,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Replace the position sizer.
    pub fn with_sizer(mut self, sizer: Box<dyn PositionSizer>) -> Self {
        self.sizer = sizer;
        self
    }

    // ── Accessors ──

    pub fn position(&self) -> Option<&Position> {
        self.lifecycle.position()
    }

    pub fn phase(&self) -> Phase {
        self.strategy.phase()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn bank(&self) -> &IndicatorBank {
        &self.bank
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Initial equity plus net realized PnL. Used for sizing.
    pub fn equity(&self) -> f64 {
        self.initial_equity + self.realized_pnl
    }

    pub fn bars_accepted(&self) -> usize {
        self.index
    }

    /// Whether `step` would process this bar rather than skip it as malformed.
    pub fn accepts(&self, bar: &Bar) -> bool {
        bar.is_sane() && self.last_ts.map_or(true, |last| bar.timestamp > last)
    }

    // ── Step ──

    pub fn step(&mut self, bar: &Bar, events: &[BrokerEvent]) -> StepOutcome {
        if !self.accepts(bar) {
            warn!(ts = %bar.timestamp, "malformed or out-of-order bar skipped");
            self.diagnostics.record_skip(SkipReason::MalformedBar);
            let mut out = StepOutcome::new(self.index, self.strategy.phase());
            out.action = StepAction::Skipped(SkipReason::MalformedBar);
            return out;
        }

        let index = self.index;
        self.index += 1;
        self.last_ts = Some(bar.timestamp);
        self.diagnostics.bars_processed += 1;
        self.bank.update(bar);

        let mut out = StepOutcome::new(index, self.strategy.phase());

        self.lifecycle.on_bar(bar);
        let rec = self.lifecycle.reconcile(events, bar);
        out.conflicts = rec.conflicts;
        self.diagnostics.reconciliation_conflicts += u64::from(rec.conflicts);
        self.diagnostics.orphaned_orders += u64::from(rec.orphaned);
        out.commands.extend(rec.commands);

        if let Some(trade) = rec.closed {
            self.record_close(index, trade, &mut out);
        } else if self.lifecycle.position().is_some() {
            self.manage_open(bar, index, &mut out);
        }

        if out.closed_trade.is_none() && self.lifecycle.is_flat() {
            self.seek_entry(bar, index, &mut out);
        }

        self.prev_bar = Some(bar.clone());
        out.phase = self.strategy.phase();
        debug_assert!(self.lifecycle.is_flat() || out.phase == Phase::Normal);
        out
    }

    fn manage_open(&mut self, bar: &Bar, index: usize, out: &mut StepOutcome) {
        let Some(bars_held) = self.lifecycle.position().map(|p| p.bars_held) else {
            return;
        };

        let reason = if self.exits.bar_count_enabled && bars_held >= self.exits.max_hold_bars {
            Some(ExitReason::BarCount)
        } else if self.crossover_exit_fires() {
            Some(ExitReason::IndicatorCross)
        } else if self.exits.manual_close_enabled && self.fresh_signal(bar, index) {
            Some(ExitReason::ManualClose)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.close_at_market(reason, bar, index, out);
            return;
        }

        match self.lifecycle.repair_protection() {
            Repair::Intact => {}
            Repair::Resubmitted(commands) => {
                self.diagnostics.resubmitted_orders += commands.len() as u64;
                out.commands.extend(commands);
            }
            Repair::Flatten => {
                self.close_at_market(ExitReason::ProtectionLost, bar, index, out);
                return;
            }
        }

        let trail = self.lifecycle.trail(bar, self.bank.current().atr);
        if !trail.is_empty() {
            self.diagnostics.trail_updates += 1;
        }
        out.commands.extend(trail);
        out.action = StepAction::Holding;
    }

    /// An exit EMA crossing above the confirm EMA on this bar.
    fn crossover_exit_fires(&self) -> bool {
        let lines: &[EmaLine] = match self.exits.crossover_exit {
            CrossoverExit::Off => &[],
            CrossoverExit::Primary => &[EmaLine::ExitPrimary],
            CrossoverExit::Either => &[EmaLine::ExitPrimary, EmaLine::ExitSecondary],
        };
        let (prev, cur) = (self.bank.previous(), self.bank.current());
        lines.iter().any(|&line| {
            crossed_above(
                prev.ema(line),
                prev.ema(EmaLine::Confirm),
                cur.ema(line),
                cur.ema(EmaLine::Confirm),
            )
        })
    }

    fn fresh_signal(&self, bar: &Bar, index: usize) -> bool {
        let ctx = SignalContext {
            index,
            bar,
            prev_bar: self.prev_bar.as_ref(),
            current: self.bank.current(),
            previous: self.bank.previous(),
            confirm_angles: self.bank.confirm_angle_history(),
        };
        is_fresh_signal(&ctx, &self.filters, self.exits.manual_close_filters)
    }

    fn close_at_market(&mut self, reason: ExitReason, bar: &Bar, index: usize, out: &mut StepOutcome) {
        if let Some((trade, commands)) = self.lifecycle.close_at_market(reason, bar) {
            out.commands.extend(commands);
            self.record_close(index, trade, out);
        }
    }

    fn record_close(&mut self, index: usize, trade: ClosedTrade, out: &mut StepOutcome) {
        self.realized_pnl += trade.pnl_after_cost;
        self.last_exit_bar = Some(index);
        self.diagnostics.exits += 1;
        out.action = StepAction::Exited(trade.exit_reason);
        out.closed_trade = Some(trade);
    }

    fn seek_entry(&mut self, bar: &Bar, index: usize, out: &mut StepOutcome) {
        if let Some(exit_bar) = self.last_exit_bar {
            if index - exit_bar < self.exits.cooldown_bars {
                self.skip(SkipReason::Cooldown, out);
                return;
            }
        }
        if !self.bank.is_warm() {
            self.skip(SkipReason::InsufficientHistory, out);
            return;
        }

        let ctx = SignalContext {
            index,
            bar,
            prev_bar: self.prev_bar.as_ref(),
            current: self.bank.current(),
            previous: self.bank.previous(),
            confirm_angles: self.bank.confirm_angle_history(),
        };
        let signal = self.strategy.advance(&ctx);
        self.diagnostics.record_signal(signal);
        out.signal = Some(signal);

        if signal == SignalOutcome::EntryFired {
            self.enter(bar, index, out);
        }
    }

    fn enter(&mut self, bar: &Bar, index: usize, out: &mut StepOutcome) {
        let Some(plan) = self.lifecycle.plan_entry(bar, self.bank.current().atr) else {
            self.skip(SkipReason::NumericDegeneracy, out);
            return;
        };
        let equity = self.equity();
        let Some(size) = self.sizer.size(equity, plan.entry_price, plan.stop) else {
            debug!(bar = index, equity, sizer = self.sizer.name(), "entry skipped: size below one contract");
            self.skip(SkipReason::InvalidSizing, out);
            return;
        };

        let commands = self.lifecycle.open(bar, index, size, plan);
        self.strategy.reset();
        self.diagnostics.entries += 1;
        info!(bar = index, size, strategy = self.strategy.name(), "entry");
        out.commands.extend(commands);
        out.action = StepAction::Entered { size };
    }

    fn skip(&mut self, reason: SkipReason, out: &mut StepOutcome) {
        self.diagnostics.record_skip(reason);
        out.action = StepAction::Skipped(reason);
    }
}
