//! SimBroker: simulated execution layer for backtests and tests.
//!
//! Holds working protective orders, matches them against each bar's range and
//! reports order-status events. Market entries and exits are applied at the
//! price the engine quotes and produce no events.
//!
//! # Per-bar cycle
//! 1. `process_bar(bar)` delivers queued acks, matches working orders against
//!    the bar, then applies any latency-deferred commands.
//! 2. The engine steps with those events.
//! 3. `submit(commands)` applies the engine's commands (or defers them).
//!
//! Protective orders are reduce-only: a sell fills only while the simulated
//! position still holds enough contracts, so at most one sibling can fill.

use super::gap_handler::{fill_price, triggers};
use super::path_policy::PathPolicy;
use crate::config::ExecutionSettings;
use crate::domain::{Bar, BrokerEvent, OrderCommand, OrderId, OrderStatus, ProtectiveOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// When protective submits and cancels take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderLatency {
    /// Applied as soon as they are submitted; working from the next bar.
    #[default]
    Immediate,
    /// Applied after the next bar has been matched. An order whose cancel is
    /// in flight can still fill on that bar.
    NextBar,
}

#[derive(Debug, Clone, Default)]
pub struct SimBroker {
    path_policy: PathPolicy,
    latency: OrderLatency,
    working: Vec<ProtectiveOrder>,
    position_qty: u64,
    deferred: Vec<OrderCommand>,
    outbox: Vec<BrokerEvent>,
    reject_budget: u32,
    fills: u64,
}

impl SimBroker {
    pub fn new(path_policy: PathPolicy, latency: OrderLatency) -> Self {
        Self {
            path_policy,
            latency,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self::new(settings.path_policy, settings.latency)
    }

    /// Reject the next `n` protective submissions.
    pub fn reject_next_submissions(&mut self, n: u32) {
        self.reject_budget += n;
    }

    /// Cancel a working order without being asked to. Reported with the next bar.
    pub fn cancel_unsolicited(&mut self, id: OrderId) -> bool {
        let Some(pos) = self.working.iter().position(|o| o.id == id) else {
            return false;
        };
        self.working.remove(pos);
        self.outbox.push(BrokerEvent::status_only(id, OrderStatus::Canceled));
        true
    }

    pub fn working_orders(&self) -> &[ProtectiveOrder] {
        &self.working
    }

    pub fn position_qty(&self) -> u64 {
        self.position_qty
    }

    pub fn fill_count(&self) -> u64 {
        self.fills
    }

    pub fn submit(&mut self, commands: &[OrderCommand]) {
        for cmd in commands {
            match cmd {
                OrderCommand::MarketEntry { .. } | OrderCommand::MarketExit { .. } => {
                    self.apply(cmd.clone());
                }
                _ => match self.latency {
                    OrderLatency::Immediate => self.apply(cmd.clone()),
                    OrderLatency::NextBar => self.deferred.push(cmd.clone()),
                },
            }
        }
    }

    pub fn process_bar(&mut self, bar: &Bar) -> Vec<BrokerEvent> {
        let mut events = std::mem::take(&mut self.outbox);

        let mut triggered: Vec<ProtectiveOrder> =
            self.working.iter().filter(|o| triggers(o, bar)).cloned().collect();
        self.path_policy.order_sequence(&mut triggered, bar);

        for order in triggered {
            if order.size == 0 || self.position_qty < order.size {
                continue;
            }
            let price = fill_price(&order, bar);
            self.position_qty -= order.size;
            self.working.retain(|o| o.id != order.id);
            self.fills += 1;
            debug!(order = %order.id, kind = ?order.kind, price, "protective order filled");
            events.push(BrokerEvent::filled(order.id, price, order.size, false));
        }

        for cmd in std::mem::take(&mut self.deferred) {
            self.apply(cmd);
        }
        events.append(&mut self.outbox);
        events
    }

    fn apply(&mut self, cmd: OrderCommand) {
        match cmd {
            OrderCommand::Submit(mut order) => {
                if self.reject_budget > 0 || order.size == 0 {
                    self.reject_budget = self.reject_budget.saturating_sub(1);
                    warn!(order = %order.id, "simulated reject");
                    self.outbox
                        .push(BrokerEvent::status_only(order.id, OrderStatus::Rejected));
                    return;
                }
                order.status = OrderStatus::Submitted;
                self.outbox
                    .push(BrokerEvent::status_only(order.id, OrderStatus::Submitted));
                self.working.push(order);
            }
            OrderCommand::Cancel(id) => {
                if let Some(pos) = self.working.iter().position(|o| o.id == id) {
                    self.working.remove(pos);
                    self.outbox
                        .push(BrokerEvent::status_only(id, OrderStatus::Canceled));
                }
            }
            OrderCommand::MarketEntry { size, .. } => {
                self.position_qty += size;
            }
            OrderCommand::MarketExit { size, .. } => {
                self.position_qty = self.position_qty.saturating_sub(size);
            }
        }
    }
}
