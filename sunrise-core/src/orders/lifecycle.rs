//! Order lifecycle manager: owns the open position and its protective siblings.
//!
//! On entry a stop and a take-profit limit are submitted as siblings. Exactly
//! one of them ends up filled; the other is canceled. While the position is
//! open the manager moves the stop (cancel old, submit new), reconciles broker
//! events, and closes the position exactly once.
//!
//! # Reconciliation rules
//! - A fill for the live stop or limit closes the position at the fill price.
//! - A fill for a stop whose cancel is still pending is authoritative: the
//!   position closes at that fill and the replacement stop is canceled.
//! - Fills for unknown orders, for orders of an earlier position, or arriving
//!   after the position closed are counted as conflicts and ignored.
//! - A reject or unsolicited cancel of a live protective order clears the
//!   local reference; `repair_protection` then applies the `OrphanPolicy`.

use super::trailing::TrailingStop;
use crate::config::{OrphanPolicy, StrategyConfig};
use crate::domain::{
    Bar, BrokerEvent, ClosedTrade, ExitReason, IdGen, OrderCommand, OrderId, OrderStatus,
    Position, ProtectiveKind, ProtectiveOrder,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub trail: TrailingStop,
    pub orphan_policy: OrphanPolicy,
    pub contract_unit: f64,
    pub commission_per_contract: f64,
    pub spread: f64,
}

impl LifecycleSettings {
    pub fn from_config(cfg: &StrategyConfig) -> Self {
        let ex = &cfg.exits;
        Self {
            sl_multiplier: ex.sl_multiplier,
            tp_multiplier: ex.tp_multiplier,
            trail: if ex.trailing_enabled {
                TrailingStop::new(ex.trail_multiplier)
            } else {
                TrailingStop::disabled()
            },
            orphan_policy: ex.orphan_policy,
            contract_unit: cfg.risk.contract_unit,
            commission_per_contract: cfg.costs.commission_per_contract,
            spread: cfg.costs.spread,
        }
    }
}

/// Protective levels for a prospective entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPlan {
    pub entry_price: f64,
    pub stop: f64,
    pub take: f64,
}

/// An order we asked the broker to cancel and have not heard back about.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingCancel {
    kind: ProtectiveKind,
    price: f64,
    /// Which position the order protected.
    position_seq: u64,
}

/// Result of feeding one bar's broker events through the manager.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub closed: Option<ClosedTrade>,
    pub commands: Vec<OrderCommand>,
    pub conflicts: u32,
    pub orphaned: u32,
}

/// What `repair_protection` decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Repair {
    Intact,
    Resubmitted(Vec<OrderCommand>),
    /// The caller must close the position with `ExitReason::ProtectionLost`.
    Flatten,
}

#[derive(Debug, Clone)]
pub struct OrderLifecycleManager {
    settings: LifecycleSettings,
    ids: IdGen,
    position: Option<Position>,
    position_seq: u64,
    pending_cancel: HashMap<OrderId, PendingCancel>,
}

impl OrderLifecycleManager {
    pub fn new(settings: LifecycleSettings) -> Self {
        Self {
            settings,
            ids: IdGen::new(),
            position: None,
            position_seq: 0,
            pending_cancel: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(LifecycleSettings::from_config(cfg))
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn pending_cancels(&self) -> usize {
        self.pending_cancel.len()
    }

    // ── Entry ──

    /// Stop below the signal bar's low, target above its high, both ATR-scaled.
    /// `None` when ATR is undefined.
    pub fn plan_entry(&self, bar: &Bar, atr: f64) -> Option<EntryPlan> {
        if !atr.is_finite() {
            return None;
        }
        let stop = bar.low - atr * self.settings.sl_multiplier;
        let take = bar.high + atr * self.settings.tp_multiplier;
        if !stop.is_finite() || !take.is_finite() {
            return None;
        }
        Some(EntryPlan {
            entry_price: bar.close,
            stop,
            take,
        })
    }

    /// Open the position at the bar close and attach both protective siblings.
    ///
    /// Returns no commands if a position is already open.
    pub fn open(&mut self, bar: &Bar, index: usize, size: u64, plan: EntryPlan) -> Vec<OrderCommand> {
        if self.position.is_some() {
            warn!(bar = index, "open requested while a position exists; ignored");
            return Vec::new();
        }

        self.position_seq += 1;
        let mut pos = Position::new(plan.entry_price, size, plan.stop, plan.take, bar.timestamp, index);

        let entry_id = self.ids.next_order_id();
        let stop = ProtectiveOrder::stop(self.ids.next_order_id(), plan.stop, size);
        let limit = ProtectiveOrder::limit(self.ids.next_order_id(), plan.take, size);
        pos.stop_order = Some(stop.id);
        pos.limit_order = Some(limit.id);

        info!(
            bar = index,
            entry = plan.entry_price,
            size,
            stop = plan.stop,
            take = plan.take,
            "position opened"
        );
        self.position = Some(pos);

        vec![
            OrderCommand::MarketEntry {
                id: entry_id,
                size,
                price: plan.entry_price,
            },
            OrderCommand::Submit(stop),
            OrderCommand::Submit(limit),
        ]
    }

    // ── Per bar ──

    /// Count the bar and track the high watermark.
    pub fn on_bar(&mut self, bar: &Bar) {
        if let Some(pos) = self.position.as_mut() {
            pos.on_bar(bar.high);
        }
    }

    /// Apply the broker's order-status events, in delivery order.
    pub fn reconcile(&mut self, events: &[BrokerEvent], bar: &Bar) -> Reconciliation {
        let mut out = Reconciliation::default();
        for event in events {
            match event.status {
                OrderStatus::Filled => self.on_fill(event, bar, &mut out),
                OrderStatus::Canceled | OrderStatus::Rejected => self.on_dead(event, &mut out),
                OrderStatus::Submitted => {}
            }
        }
        out
    }

    fn on_fill(&mut self, event: &BrokerEvent, bar: &Bar, out: &mut Reconciliation) {
        let id = event.order_id;
        let pending = self.pending_cancel.remove(&id);

        let Some(pos) = self.position.as_ref() else {
            warn!(order = %id, "fill arrived with no open position; ignored");
            out.conflicts += 1;
            return;
        };
        if event.is_buy {
            warn!(order = %id, "buy fill on a protective sell order; ignored");
            out.conflicts += 1;
            return;
        }

        let (reason, level) = if pos.stop_order == Some(id) {
            (stop_reason(pos.stop_raised), pos.stop_level)
        } else if pos.limit_order == Some(id) {
            (ExitReason::TakeProfit, pos.take_level)
        } else {
            match pending {
                Some(p) if p.position_seq == self.position_seq => {
                    debug!(order = %id, "fill for an order with a pending cancel; trusting the fill");
                    let reason = match p.kind {
                        // Judged on the position's stop, not on the level the
                        // filled order carried.
                        ProtectiveKind::Stop => stop_reason(pos.stop_raised),
                        ProtectiveKind::Limit => ExitReason::TakeProfit,
                    };
                    (reason, p.price)
                }
                _ => {
                    warn!(order = %id, "fill for an unknown or stale order; ignored");
                    out.conflicts += 1;
                    return;
                }
            }
        };

        if event.fill_size != 0 && event.fill_size != pos.size {
            warn!(order = %id, fill = event.fill_size, size = pos.size, "partial fill treated as full exit");
        }
        let price = event.fill_price.filter(|p| p.is_finite()).unwrap_or(level);

        // The filled order is done; only its sibling(s) need canceling.
        if let Some(pos) = self.position.as_mut() {
            if pos.stop_order == Some(id) {
                pos.stop_order = None;
            } else if pos.limit_order == Some(id) {
                pos.limit_order = None;
            }
        }
        if let Some((trade, commands)) = self.close(reason, price, bar, false) {
            out.closed = Some(trade);
            out.commands.extend(commands);
        }
    }

    fn on_dead(&mut self, event: &BrokerEvent, out: &mut Reconciliation) {
        let id = event.order_id;
        if self.pending_cancel.remove(&id).is_some() {
            return;
        }
        let Some(pos) = self.position.as_mut() else {
            return;
        };
        if pos.stop_order == Some(id) {
            pos.stop_order = None;
        } else if pos.limit_order == Some(id) {
            pos.limit_order = None;
        } else {
            debug!(order = %id, status = ?event.status, "status for an untracked order");
            return;
        }
        warn!(order = %id, status = ?event.status, "protective order lost");
        out.orphaned += 1;
    }

    /// Re-establish missing protective orders according to the orphan policy.
    pub fn repair_protection(&mut self) -> Repair {
        let Some(pos) = self.position.as_mut() else {
            return Repair::Intact;
        };
        if pos.stop_order.is_some() && pos.limit_order.is_some() {
            return Repair::Intact;
        }
        if self.settings.orphan_policy == OrphanPolicy::Flatten {
            return Repair::Flatten;
        }

        let mut commands = Vec::new();
        if pos.stop_order.is_none() {
            let order = ProtectiveOrder::stop(self.ids.next_order_id(), pos.stop_level, pos.size);
            pos.stop_order = Some(order.id);
            info!(order = %order.id, level = order.price, "stop resubmitted");
            commands.push(OrderCommand::Submit(order));
        }
        if pos.limit_order.is_none() {
            let order = ProtectiveOrder::limit(self.ids.next_order_id(), pos.take_level, pos.size);
            pos.limit_order = Some(order.id);
            info!(order = %order.id, level = order.price, "take-profit resubmitted");
            commands.push(OrderCommand::Submit(order));
        }
        Repair::Resubmitted(commands)
    }

    /// Move the stop up if the trailing rule allows: cancel the old stop and
    /// submit a replacement at the new level.
    pub fn trail(&mut self, bar: &Bar, atr: f64) -> Vec<OrderCommand> {
        let Some(pos) = self.position.as_mut() else {
            return Vec::new();
        };
        let Some(level) = self.settings.trail.propose(bar, atr, pos.stop_level) else {
            return Vec::new();
        };

        let old_level = pos.stop_level;
        if !pos.raise_stop(level) {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        if let Some(old) = pos.stop_order.take() {
            self.pending_cancel.insert(
                old,
                PendingCancel {
                    kind: ProtectiveKind::Stop,
                    price: old_level,
                    position_seq: self.position_seq,
                },
            );
            commands.push(OrderCommand::Cancel(old));
        }
        let replacement = ProtectiveOrder::stop(self.ids.next_order_id(), level, pos.size);
        pos.stop_order = Some(replacement.id);
        debug!(level, order = %replacement.id, "trailing stop raised");
        commands.push(OrderCommand::Submit(replacement));
        commands
    }

    // ── Exit ──

    /// Close at the bar close (bar-count, crossover, manual and protection-lost exits).
    pub fn close_at_market(&mut self, reason: ExitReason, bar: &Bar) -> Option<(ClosedTrade, Vec<OrderCommand>)> {
        self.close(reason, bar.close, bar, true)
    }

    fn close(
        &mut self,
        reason: ExitReason,
        exit_price: f64,
        bar: &Bar,
        at_market: bool,
    ) -> Option<(ClosedTrade, Vec<OrderCommand>)> {
        let pos = self.position.take()?;
        let mut commands = Vec::new();

        for (live, kind, price) in [
            (pos.stop_order, ProtectiveKind::Stop, pos.stop_level),
            (pos.limit_order, ProtectiveKind::Limit, pos.take_level),
        ] {
            if let Some(id) = live {
                self.pending_cancel.insert(
                    id,
                    PendingCancel {
                        kind,
                        price,
                        position_seq: self.position_seq,
                    },
                );
                commands.push(OrderCommand::Cancel(id));
            }
        }
        if at_market {
            commands.push(OrderCommand::MarketExit {
                id: self.ids.next_order_id(),
                size: pos.size,
                price: exit_price,
            });
        }

        let trade = self.closed_trade(&pos, exit_price, reason, bar);
        info!(
            reason = %reason,
            exit = exit_price,
            pnl = trade.pnl_after_cost,
            bars = trade.bars_held,
            "position closed"
        );
        Some((trade, commands))
    }

    fn closed_trade(&self, pos: &Position, exit_price: f64, reason: ExitReason, bar: &Bar) -> ClosedTrade {
        let (pnl, pnl_after_cost) = trade_pnl(
            pos.entry_price,
            exit_price,
            pos.size,
            self.settings.contract_unit,
            self.settings.commission_per_contract,
            self.settings.spread,
        );
        ClosedTrade {
            entry_price: pos.entry_price,
            entry_ts: pos.entry_ts,
            exit_price,
            exit_ts: bar.timestamp,
            exit_reason: reason,
            size: pos.size,
            pnl,
            pnl_after_cost,
            bars_held: pos.bars_held,
        }
    }
}

fn stop_reason(raised: bool) -> ExitReason {
    if raised {
        ExitReason::TrailingStop
    } else {
        ExitReason::Stop
    }
}

/// Gross and net PnL of a long round trip.
///
/// ```text
/// pnl            = (exit - entry) * size * contract_unit
/// pnl_after_cost = pnl - size * commission - size * contract_unit * spread
/// ```
pub fn trade_pnl(
    entry: f64,
    exit: f64,
    size: u64,
    contract_unit: f64,
    commission_per_contract: f64,
    spread: f64,
) -> (f64, f64) {
    let qty = size as f64;
    let pnl = (exit - entry) * qty * contract_unit;
    let costs = qty * commission_per_contract + qty * contract_unit * spread;
    (pnl, pnl - costs)
}
