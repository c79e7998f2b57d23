//! Run diagnostics: counters collected by the engine while it steps.
//!
//! Nothing here influences trading. The counters explain why a run produced
//! the trades it did: how often the machine armed, which filter rejected
//! breakouts, how many bars were skipped and why, and how often the broker
//! and the lifecycle manager disagreed.

use super::step::SkipReason;
use crate::signals::{FilterKind, FilterVerdict, InvalidationReason, SignalOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which secondary filters blocked otherwise-qualified entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterAttrition {
    pub rejected: BTreeMap<FilterKind, u64>,
    /// Blocked because an input was NaN.
    pub degenerate: BTreeMap<FilterKind, u64>,
}

impl FilterAttrition {
    pub fn record(&mut self, verdict: FilterVerdict) {
        match verdict {
            FilterVerdict::Passed => {}
            FilterVerdict::Rejected(kind) => *self.rejected.entry(kind).or_default() += 1,
            FilterVerdict::Degenerate(kind) => *self.degenerate.entry(kind).or_default() += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.rejected.values().sum::<u64>() + self.degenerate.values().sum::<u64>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub bars_processed: u64,
    pub skips: BTreeMap<SkipReason, u64>,

    // ── Signal machine ──
    pub armed: u64,
    pub pullback_candles: u64,
    pub windows_opened: u64,
    pub entries_fired: u64,
    pub invalidations: BTreeMap<InvalidationReason, u64>,
    pub filters: FilterAttrition,

    // ── Lifecycle ──
    pub entries: u64,
    pub exits: u64,
    pub trail_updates: u64,
    pub resubmitted_orders: u64,
    pub orphaned_orders: u64,
    /// Broker events that did not match the local order state.
    pub reconciliation_conflicts: u64,
}

impl Diagnostics {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skips.entry(reason).or_default() += 1;
    }

    pub fn skipped(&self, reason: SkipReason) -> u64 {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn record_signal(&mut self, outcome: SignalOutcome) {
        match outcome {
            SignalOutcome::Idle => {}
            SignalOutcome::Armed => self.armed += 1,
            SignalOutcome::PullbackCandle { .. } => self.pullback_candles += 1,
            SignalOutcome::WindowOpened { .. } => self.windows_opened += 1,
            SignalOutcome::Invalidated(reason) => {
                *self.invalidations.entry(reason).or_default() += 1;
            }
            SignalOutcome::FilterRejected(verdict) => self.filters.record(verdict),
            SignalOutcome::EntryFired => self.entries_fired += 1,
        }
    }
}
