//! Strategy configuration: TOML loading, validation and fingerprinting.
//!
//! Every section carries serde defaults so a config file only needs the
//! values it changes. A config is immutable for the life of a run.

use crate::domain::ConfigHash;
use crate::execution::{OrderLatency, PathPolicy};
use crate::indicators::EmaLine;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Enumerated options ──

/// Which entry strategy drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Trigger, pullback, then breakout of the pullback high.
    #[default]
    PullbackBreakout,
    /// Enter on the trigger bar itself when every filter passes.
    DirectCrossover,
}

/// Which EMA ordering the ordering filter demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmaOrderMode {
    /// confirm above each of fast, medium and slow.
    #[default]
    ConfirmAboveAll,
    /// fast > medium > slow.
    FastMediumSlow,
    /// confirm > fast > medium > slow.
    Full,
}

/// Which exit lines trigger the indicator-crossover exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverExit {
    Off,
    #[default]
    Primary,
    /// Either exit line crossing above confirm closes the position.
    Either,
}

/// How much of the entry logic a "fresh signal" must satisfy to trigger a manual close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ManualCloseFilters {
    /// The raw crossover trigger alone.
    #[default]
    Trigger,
    /// Trigger plus every enabled secondary filter.
    Full,
}

/// What to do when a protective order is rejected or canceled by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Resubmit the missing order at the current level on the next bar.
    #[default]
    Resubmit,
    /// Close the position at the next bar's close.
    Flatten,
}

// ── Sections ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StrategySection {
    pub kind: StrategyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    pub ema_medium: usize,
    pub ema_slow: usize,
    pub ema_confirm: usize,
    pub ema_baseline: usize,
    pub ema_exit_primary: usize,
    pub ema_exit_secondary: usize,
    pub atr_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast: 14,
            ema_medium: 18,
            ema_slow: 24,
            ema_confirm: 1,
            ema_baseline: 50,
            ema_exit_primary: 25,
            ema_exit_secondary: 40,
            atr_period: 10,
        }
    }
}

impl IndicatorSettings {
    pub fn ema_period(&self, line: EmaLine) -> usize {
        match line {
            EmaLine::Fast => self.ema_fast,
            EmaLine::Medium => self.ema_medium,
            EmaLine::Slow => self.ema_slow,
            EmaLine::Confirm => self.ema_confirm,
            EmaLine::Baseline => self.ema_baseline,
            EmaLine::ExitPrimary => self.ema_exit_primary,
            EmaLine::ExitSecondary => self.ema_exit_secondary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleSettings {
    pub lookback: usize,
    pub scale: f64,
    pub min_degrees: f64,
    /// Upper bound on the confirm angle. Too steep a slope is refused too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_degrees: Option<f64>,
    /// Number of most recent bars (current included) the confirm angle must
    /// stay inside `(min_degrees, max_degrees]`.
    pub persistence_bars: usize,
}

impl Default for AngleSettings {
    fn default() -> Self {
        Self {
            lookback: 5,
            scale: 10_000.0,
            min_degrees: 75.0,
            max_degrees: None,
            persistence_bars: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackSettings {
    pub max_red_candles: u32,
    pub window_length: usize,
    /// Added to the pullback reference high to form the breakout target.
    pub price_offset: f64,
}

impl Default for PullbackSettings {
    fn default() -> Self {
        Self {
            max_red_candles: 1,
            window_length: 10,
            price_offset: 0.0002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub ema_order_enabled: bool,
    pub ema_order: EmaOrderMode,
    pub baseline_enabled: bool,
    pub angle_enabled: bool,
    pub divergence_enabled: bool,
    pub max_divergence_fm: f64,
    pub max_divergence_ms: f64,
    pub atr_band_enabled: bool,
    pub atr_min: f64,
    pub atr_max: f64,
    pub session_enabled: bool,
    pub session_start: NaiveTime,
    pub session_end: NaiveTime,
    pub atr_change: AtrChangeSettings,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            ema_order_enabled: true,
            ema_order: EmaOrderMode::ConfirmAboveAll,
            baseline_enabled: true,
            angle_enabled: true,
            divergence_enabled: false,
            max_divergence_fm: 3.0,
            max_divergence_ms: 6.0,
            atr_band_enabled: false,
            atr_min: 0.0,
            atr_max: 1.0,
            session_enabled: false,
            session_start: NaiveTime::MIN,
            session_end: NaiveTime::MIN,
            atr_change: AtrChangeSettings::default(),
        }
    }
}

/// ATR change between the trigger bar and the entry bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrChangeSettings {
    pub enabled: bool,
    /// When off, any rise in ATR is refused.
    pub increment_enabled: bool,
    pub increment_min: f64,
    pub increment_max: f64,
    /// When off, any fall in ATR is accepted.
    pub decrement_enabled: bool,
    pub decrement_min: f64,
    pub decrement_max: f64,
}

impl Default for AtrChangeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            increment_enabled: false,
            increment_min: 0.0,
            increment_max: 0.0,
            decrement_enabled: true,
            decrement_min: -0.000_05,
            decrement_max: -0.000_001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub initial_equity: f64,
    pub risk_fraction: f64,
    pub contract_unit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_contracts: Option<u64>,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            initial_equity: 100_000.0,
            risk_fraction: 0.01,
            contract_unit: 100_000.0,
            max_contracts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitSettings {
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub trailing_enabled: bool,
    pub trail_multiplier: f64,
    pub bar_count_enabled: bool,
    pub max_hold_bars: usize,
    pub crossover_exit: CrossoverExit,
    pub manual_close_enabled: bool,
    pub manual_close_filters: ManualCloseFilters,
    pub orphan_policy: OrphanPolicy,
    /// Bars after an exit during which no entry is evaluated.
    pub cooldown_bars: usize,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            sl_multiplier: 2.5,
            tp_multiplier: 12.0,
            trailing_enabled: true,
            trail_multiplier: 2.5,
            bar_count_enabled: true,
            max_hold_bars: 100,
            crossover_exit: CrossoverExit::Primary,
            manual_close_enabled: false,
            manual_close_filters: ManualCloseFilters::Trigger,
            orphan_policy: OrphanPolicy::Resubmit,
            cooldown_bars: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    pub commission_per_contract: f64,
    /// Spread in price units, charged once per round trip.
    pub spread: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            commission_per_contract: 2.5,
            spread: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExecutionSettings {
    pub path_policy: PathPolicy,
    pub latency: OrderLatency,
}

// ── Root ──

/// Complete, immutable configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StrategyConfig {
    pub strategy: StrategySection,
    pub indicators: IndicatorSettings,
    pub angle: AngleSettings,
    pub pullback: PullbackSettings,
    pub filters: FilterSettings,
    pub risk: RiskSettings,
    pub exits: ExitSettings,
    pub costs: CostSettings,
    pub execution: ExecutionSettings,
}

impl StrategyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: StrategyConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// BLAKE3 over the canonical JSON form. Equal configs hash equally
    /// regardless of how the TOML was laid out.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(ConfigHash(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ind = &self.indicators;
        for line in EmaLine::ALL {
            if ind.ema_period(line) == 0 {
                return Err(invalid("indicators.ema_*", format!("{} period must be >= 1", line.name())));
            }
        }
        if ind.atr_period == 0 {
            return Err(invalid("indicators.atr_period", "must be >= 1"));
        }

        let angle = &self.angle;
        if angle.lookback < 2 {
            return Err(invalid("angle.lookback", "must be >= 2"));
        }
        positive("angle.scale", angle.scale)?;
        if !angle.min_degrees.is_finite() || angle.min_degrees.abs() >= 90.0 {
            return Err(invalid("angle.min_degrees", "must lie strictly between -90 and 90"));
        }
        if let Some(max) = angle.max_degrees {
            if !max.is_finite() || max.abs() >= 90.0 || max <= angle.min_degrees {
                return Err(invalid(
                    "angle.max_degrees",
                    "must lie below 90 and above angle.min_degrees",
                ));
            }
        }
        if angle.persistence_bars == 0 {
            return Err(invalid("angle.persistence_bars", "must be >= 1"));
        }

        let pb = &self.pullback;
        if pb.max_red_candles == 0 {
            return Err(invalid("pullback.max_red_candles", "must be >= 1"));
        }
        if pb.window_length == 0 {
            return Err(invalid("pullback.window_length", "must be >= 1"));
        }
        non_negative("pullback.price_offset", pb.price_offset)?;

        let f = &self.filters;
        positive("filters.max_divergence_fm", f.max_divergence_fm)?;
        positive("filters.max_divergence_ms", f.max_divergence_ms)?;
        non_negative("filters.atr_min", f.atr_min)?;
        non_negative("filters.atr_max", f.atr_max)?;
        if f.atr_min > f.atr_max {
            return Err(invalid("filters.atr_min", "must not exceed filters.atr_max"));
        }
        let ac = &f.atr_change;
        for (field, lo, hi) in [
            ("filters.atr_change.increment_min", ac.increment_min, ac.increment_max),
            ("filters.atr_change.decrement_min", ac.decrement_min, ac.decrement_max),
        ] {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(invalid(field, "range bounds must be finite with min <= max"));
            }
        }

        let risk = &self.risk;
        positive("risk.initial_equity", risk.initial_equity)?;
        positive("risk.contract_unit", risk.contract_unit)?;
        if !(risk.risk_fraction > 0.0 && risk.risk_fraction <= 1.0) {
            return Err(invalid("risk.risk_fraction", "must be in (0, 1]"));
        }
        if risk.max_contracts == Some(0) {
            return Err(invalid("risk.max_contracts", "must be >= 1 when set"));
        }

        let ex = &self.exits;
        positive("exits.sl_multiplier", ex.sl_multiplier)?;
        positive("exits.tp_multiplier", ex.tp_multiplier)?;
        positive("exits.trail_multiplier", ex.trail_multiplier)?;
        if ex.max_hold_bars == 0 {
            return Err(invalid("exits.max_hold_bars", "must be >= 1"));
        }

        non_negative("costs.commission_per_contract", self.costs.commission_per_contract)?;
        non_negative("costs.spread", self.costs.spread)?;

        Ok(())
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive finite number, got {v}")))
    }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a finite number >= 0, got {v}")))
    }
}
