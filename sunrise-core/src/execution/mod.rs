//! Execution: simulated broker matching of protective orders
//!
//! Key concepts:
//! - **Triggering**: a stop triggers when the low reaches it, a limit when the high does
//! - **Gap rules**: an order the open already passed fills at the open
//! - **Path policies**: which sibling fills when the bar touches both
//! - **Latency**: whether submits and cancels land before or after the next bar

pub mod gap_handler;
pub mod path_policy;
pub mod sim_broker;

pub use path_policy::PathPolicy;
pub use sim_broker::{OrderLatency, SimBroker};
