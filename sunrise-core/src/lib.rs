//! Sunrise Core: pullback/breakout execution core for a single instrument.
//!
//! This crate contains the whole per-bar decision pipeline:
//! - Domain types (bars, protective orders, broker events, positions, trades)
//! - Streaming indicator bank (median-price EMAs, Wilder ATR, slope angles)
//! - Entry state machines and secondary filters
//! - Risk-based position sizing
//! - Order lifecycle manager with trailing stop and broker reconciliation
//! - Simulated broker with configurable path policy and latency
//! - Engine step, backtest driver and trade ledger

pub mod config;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod orders;
pub mod signals;
pub mod sizers;
pub mod synthetic;
