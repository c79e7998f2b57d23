//! Domain types for the Sunrise execution core

pub mod bar;
pub mod ids;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ids::{ConfigHash, IdGen, OrderId};
pub use order::{BrokerEvent, OrderCommand, OrderStatus, ProtectiveKind, ProtectiveOrder};
pub use position::Position;
pub use trade::{ClosedTrade, ExitReason};
