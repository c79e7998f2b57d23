//! Fixed-fractional risk sizer
//!
//! # Formula
//! ```text
//! risk_value   = equity * risk_fraction
//! per_contract = |entry - stop| * contract_unit
//! size         = floor(risk_value / per_contract)
//! ```
//!
//! # Example
//! - Equity: 100,000, risk 1% → 1,000
//! - Entry 1.2000, stop 1.1990, contract unit 100,000 → 100 per contract
//! - Size: 10 contracts

use super::PositionSizer;
use crate::config::RiskSettings;

/// Absorbs binary floating-point error before flooring, so 9.9999999999 → 10.
const FLOOR_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct RiskSizer {
    risk_fraction: f64,
    contract_unit: f64,
    max_contracts: Option<u64>,
}

impl RiskSizer {
    pub fn new(risk_fraction: f64, contract_unit: f64) -> Self {
        Self {
            risk_fraction,
            contract_unit,
            max_contracts: None,
        }
    }

    pub fn with_max_contracts(mut self, max: Option<u64>) -> Self {
        self.max_contracts = max;
        self
    }

    pub fn from_settings(risk: &RiskSettings) -> Self {
        Self::new(risk.risk_fraction, risk.contract_unit).with_max_contracts(risk.max_contracts)
    }
}

impl PositionSizer for RiskSizer {
    fn size(&self, equity: f64, entry: f64, stop: f64) -> Option<u64> {
        if ![equity, entry, stop, self.risk_fraction, self.contract_unit]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }
        let distance = (entry - stop).abs();
        if distance <= 0.0 || equity <= 0.0 || self.contract_unit <= 0.0 {
            return None;
        }

        let risk_value = equity * self.risk_fraction;
        let per_contract = distance * self.contract_unit;
        let raw = (risk_value / per_contract + FLOOR_TOLERANCE).floor();
        if !raw.is_finite() || raw < 1.0 {
            return None;
        }

        let size = raw as u64;
        Some(match self.max_contracts {
            Some(max) => size.min(max),
            None => size,
        })
    }

    fn name(&self) -> &str {
        "risk_fraction"
    }
}
