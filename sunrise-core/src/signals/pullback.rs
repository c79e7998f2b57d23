//! Pullback/breakout state machine.
//!
//! NORMAL → WAITING_PULLBACK on the crossover trigger, counts bearish bars,
//! opens a breakout window on the first bullish bar after the pullback, and
//! fires when a bar's high reaches the pullback high plus an offset with every
//! secondary filter passing.

use super::{
    trigger_fires, EntryFilters, EntryStrategy, InvalidationReason, Phase, SignalContext,
    SignalOutcome, SignalState,
};
use crate::config::StrategyConfig;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PullbackBreakout {
    state: SignalState,
    max_red_candles: u32,
    window_length: usize,
    price_offset: f64,
    filters: EntryFilters,
}

impl PullbackBreakout {
    pub fn new(
        max_red_candles: u32,
        window_length: usize,
        price_offset: f64,
        filters: EntryFilters,
    ) -> Self {
        Self {
            state: SignalState::default(),
            max_red_candles,
            window_length,
            price_offset,
            filters,
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(
            cfg.pullback.max_red_candles,
            cfg.pullback.window_length,
            cfg.pullback.price_offset,
            EntryFilters::from_config(cfg),
        )
    }

    fn invalidate(&mut self, index: usize, reason: InvalidationReason) -> SignalOutcome {
        debug!(bar = index, ?reason, from = ?self.state.phase, "signal invalidated");
        self.state.reset();
        SignalOutcome::Invalidated(reason)
    }

    fn on_normal(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome {
        if !trigger_fires(ctx) {
            return SignalOutcome::Idle;
        }
        self.state.phase = Phase::WaitingPullback;
        self.state.signal_atr = Some(ctx.current.atr);
        debug!(bar = ctx.index, atr = ctx.current.atr, "trigger: waiting for pullback");
        SignalOutcome::Armed
    }

    fn on_waiting_pullback(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome {
        let bar = ctx.bar;
        if bar.is_bearish() {
            self.state.red_candle_count += 1;
            if self.state.red_candle_count == 1 {
                self.state.pullback_reference_high = Some(bar.high);
            }
            if self.state.red_candle_count > self.max_red_candles {
                return self.invalidate(ctx.index, InvalidationReason::PullbackTooDeep);
            }
            return SignalOutcome::PullbackCandle {
                red_count: self.state.red_candle_count,
            };
        }

        if bar.is_bullish() {
            let reference = match self.state.pullback_reference_high {
                Some(high) if self.state.red_candle_count > 0 => high,
                _ => return self.invalidate(ctx.index, InvalidationReason::NoPullback),
            };
            let target = reference + self.price_offset;
            self.state.phase = Phase::WaitingBreakout;
            self.state.window_start_bar = Some(ctx.index);
            self.state.breakout_target_price = Some(target);
            debug!(bar = ctx.index, target, "pullback done: breakout window open");
            return SignalOutcome::WindowOpened { target };
        }

        // Doji: neither side.
        SignalOutcome::Idle
    }

    fn on_waiting_breakout(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome {
        let (start, target) = match (self.state.window_start_bar, self.state.breakout_target_price) {
            (Some(start), Some(target)) => (start, target),
            // Unreachable through `advance`; recover rather than stall.
            _ => return self.invalidate(ctx.index, InvalidationReason::WindowExpired),
        };

        if ctx.index.saturating_sub(start) >= self.window_length {
            return self.invalidate(ctx.index, InvalidationReason::WindowExpired);
        }

        if ctx.bar.high < target {
            return SignalOutcome::Idle;
        }

        let signal_atr = self.state.signal_atr.unwrap_or(f64::NAN);
        let verdict = self.filters.evaluate_since(ctx, signal_atr);
        if !verdict.passed() {
            debug!(bar = ctx.index, ?verdict, "breakout rejected by filters");
            return SignalOutcome::FilterRejected(verdict);
        }

        debug!(bar = ctx.index, high = ctx.bar.high, target, "entry fired");
        self.state.reset();
        SignalOutcome::EntryFired
    }
}

impl EntryStrategy for PullbackBreakout {
    fn name(&self) -> &'static str {
        "pullback_breakout"
    }

    fn advance(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome {
        match self.state.phase {
            Phase::Normal => self.on_normal(ctx),
            Phase::WaitingPullback => self.on_waiting_pullback(ctx),
            Phase::WaitingBreakout => self.on_waiting_breakout(ctx),
        }
    }

    fn state(&self) -> &SignalState {
        &self.state
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
