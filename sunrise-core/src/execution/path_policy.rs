//! Path policies: resolve intrabar ambiguity
//!
//! When both protective siblings could trigger in the same bar, the bar alone
//! cannot say which level was touched first. The policy decides.

use super::gap_handler::gapped_through;
use crate::domain::{Bar, ProtectiveKind, ProtectiveOrder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Adversarial: the stop fills before the take-profit.
    #[default]
    WorstCase,
    /// Optimistic: the take-profit fills before the stop.
    BestCase,
    /// The extreme nearer the open is visited first (ties go to the low).
    Deterministic,
}

impl PathPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            PathPolicy::WorstCase => "worst_case",
            PathPolicy::BestCase => "best_case",
            PathPolicy::Deterministic => "deterministic",
        }
    }

    /// Sort triggered orders into fill sequence for this bar.
    ///
    /// Orders the open has already gapped through come first regardless of
    /// policy. Within a kind, submission order (id) is kept.
    pub fn order_sequence(&self, orders: &mut [ProtectiveOrder], bar: &Bar) {
        let low_first = self.low_first(bar);
        orders.sort_by(|a, b| {
            let gap_a = gapped_through(a, bar);
            let gap_b = gapped_through(b, bar);
            match gap_b.cmp(&gap_a) {
                Ordering::Equal => {}
                other => return other,
            }
            let rank = |o: &ProtectiveOrder| match (o.kind, low_first) {
                (ProtectiveKind::Stop, true) | (ProtectiveKind::Limit, false) => 0,
                _ => 1,
            };
            rank(a).cmp(&rank(b)).then(a.id.cmp(&b.id))
        });
    }

    fn low_first(&self, bar: &Bar) -> bool {
        match self {
            PathPolicy::WorstCase => true,
            PathPolicy::BestCase => false,
            PathPolicy::Deterministic => (bar.open - bar.low) <= (bar.high - bar.open),
        }
    }
}
