//! Protective orders, broker events and the commands the core emits.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};

/// Which side of the bracket a protective order sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectiveKind {
    /// Sell-stop below the market.
    Stop,
    /// Sell-limit above the market (take-profit).
    Limit,
}

/// Order status as reported by the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Submitted)
    }
}

/// A working stop or limit order protecting the open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveOrder {
    pub id: OrderId,
    pub kind: ProtectiveKind,
    pub price: f64,
    pub size: u64,
    pub status: OrderStatus,
}

impl ProtectiveOrder {
    pub fn stop(id: OrderId, price: f64, size: u64) -> Self {
        Self {
            id,
            kind: ProtectiveKind::Stop,
            price,
            size,
            status: OrderStatus::Submitted,
        }
    }

    pub fn limit(id: OrderId, price: f64, size: u64) -> Self {
        Self {
            id,
            kind: ProtectiveKind::Limit,
            price,
            size,
            status: OrderStatus::Submitted,
        }
    }
}

/// Order-status notification delivered to the core alongside a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub fill_price: Option<f64>,
    pub fill_size: u64,
    pub is_buy: bool,
}

impl BrokerEvent {
    pub fn filled(order_id: OrderId, price: f64, size: u64, is_buy: bool) -> Self {
        Self {
            order_id,
            status: OrderStatus::Filled,
            fill_price: Some(price),
            fill_size: size,
            is_buy,
        }
    }

    pub fn status_only(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            fill_price: None,
            fill_size: 0,
            is_buy: false,
        }
    }
}

/// Instruction from the core to the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderCommand {
    Submit(ProtectiveOrder),
    Cancel(OrderId),
    /// Buy at the signal bar's close.
    MarketEntry { id: OrderId, size: u64, price: f64 },
    /// Sell the whole position at the current bar's close.
    MarketExit { id: OrderId, size: u64, price: f64 },
}

impl OrderCommand {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderCommand::Submit(order) => order.id,
            OrderCommand::Cancel(id) => *id,
            OrderCommand::MarketEntry { id, .. } | OrderCommand::MarketExit { id, .. } => *id,
        }
    }
}
