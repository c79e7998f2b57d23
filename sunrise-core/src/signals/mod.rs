//! Entry signal detection.
//!
//! An `EntryStrategy` is fed one `SignalContext` per bar while the engine is
//! flat. It owns its `SignalState` exclusively and reports what happened as a
//! `SignalOutcome`. Strategies never see position or account state.

pub mod crossover;
pub mod factory;
pub mod filters;
pub mod pullback;

pub use crossover::DirectCrossover;
pub use factory::create_strategy;
pub use filters::{EntryFilters, FilterKind, FilterVerdict};
pub use pullback::PullbackBreakout;

use crate::domain::Bar;
use crate::indicators::{EmaLine, IndicatorSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Phase of the pullback/breakout machine. Entry firing folds straight back
/// into `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Normal,
    WaitingPullback,
    WaitingBreakout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SignalState {
    pub phase: Phase,
    pub red_candle_count: u32,
    pub pullback_reference_high: Option<f64>,
    pub window_start_bar: Option<usize>,
    pub breakout_target_price: Option<f64>,
    /// ATR on the trigger bar, for the ATR-change filter.
    pub signal_atr: Option<f64>,
}

impl SignalState {
    pub fn reset(&mut self) {
        *self = SignalState::default();
    }

    pub fn is_normal(&self) -> bool {
        self.phase == Phase::Normal
    }
}

/// Why the machine fell back to `Normal` without firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// More bearish bars than the pullback allows.
    PullbackTooDeep,
    /// A bullish bar arrived before any bearish bar.
    NoPullback,
    /// The breakout window ran out.
    WindowExpired,
}

/// What a single `advance` call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalOutcome {
    /// Nothing changed.
    Idle,
    /// NORMAL → WAITING_PULLBACK.
    Armed,
    /// Bearish bar counted inside the pullback.
    PullbackCandle { red_count: u32 },
    /// WAITING_PULLBACK → WAITING_BREAKOUT.
    WindowOpened { target: f64 },
    /// Back to NORMAL without an entry.
    Invalidated(InvalidationReason),
    /// Price qualified but a secondary filter said no; the state is unchanged.
    FilterRejected(FilterVerdict),
    /// Enter now. The state has already been reset.
    EntryFired,
}

/// Everything a strategy may look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub index: usize,
    pub bar: &'a Bar,
    pub prev_bar: Option<&'a Bar>,
    pub current: &'a IndicatorSnapshot,
    pub previous: &'a IndicatorSnapshot,
    /// Confirm-EMA angles, newest last.
    pub confirm_angles: &'a VecDeque<f64>,
}

/// Per-bar entry logic.
pub trait EntryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advance the machine by one bar.
    fn advance(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome;

    fn state(&self) -> &SignalState;

    /// Force the machine back to NORMAL.
    fn reset(&mut self);

    fn phase(&self) -> Phase {
        self.state().phase
    }
}

/// `prev_a <= prev_b && cur_a > cur_b`. False if any input is NaN.
pub fn crossed_above(prev_a: f64, prev_b: f64, cur_a: f64, cur_b: f64) -> bool {
    prev_a <= prev_b && cur_a > cur_b
}

/// The NORMAL-state trigger: previous bar bullish and the confirm EMA crossing
/// above at least one of fast, medium or slow on this bar.
pub fn trigger_fires(ctx: &SignalContext<'_>) -> bool {
    let prev_bullish = ctx.prev_bar.is_some_and(Bar::is_bullish);
    if !prev_bullish {
        return false;
    }
    let prev_confirm = ctx.previous.ema(EmaLine::Confirm);
    let cur_confirm = ctx.current.ema(EmaLine::Confirm);
    EmaLine::TREND.iter().any(|&line| {
        crossed_above(
            prev_confirm,
            ctx.previous.ema(line),
            cur_confirm,
            ctx.current.ema(line),
        )
    })
}

/// Would a new entry signal appear on this bar? Used by the manual-close exit.
/// Pure: touches no strategy state.
pub fn is_fresh_signal(
    ctx: &SignalContext<'_>,
    filters: &EntryFilters,
    depth: crate::config::ManualCloseFilters,
) -> bool {
    use crate::config::ManualCloseFilters;
    if !trigger_fires(ctx) {
        return false;
    }
    match depth {
        ManualCloseFilters::Trigger => true,
        ManualCloseFilters::Full => filters.evaluate(ctx).passed(),
    }
}
