//! Direct crossover entry: the trigger bar itself enters when every filter passes.
//! The machine never leaves NORMAL.

use super::{trigger_fires, EntryFilters, EntryStrategy, SignalContext, SignalOutcome, SignalState};
use crate::config::StrategyConfig;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DirectCrossover {
    state: SignalState,
    filters: EntryFilters,
}

impl DirectCrossover {
    pub fn new(filters: EntryFilters) -> Self {
        Self {
            state: SignalState::default(),
            filters,
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(EntryFilters::from_config(cfg))
    }
}

impl EntryStrategy for DirectCrossover {
    fn name(&self) -> &'static str {
        "direct_crossover"
    }

    fn advance(&mut self, ctx: &SignalContext<'_>) -> SignalOutcome {
        if !trigger_fires(ctx) {
            return SignalOutcome::Idle;
        }
        let verdict = self.filters.evaluate(ctx);
        if verdict.passed() {
            debug!(bar = ctx.index, "crossover entry fired");
            SignalOutcome::EntryFired
        } else {
            SignalOutcome::FilterRejected(verdict)
        }
    }

    fn state(&self) -> &SignalState {
        &self.state
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
