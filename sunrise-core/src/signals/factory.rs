//! Strategy factory: resolves `StrategyKind` into a boxed `EntryStrategy`.

use super::{DirectCrossover, EntryStrategy, PullbackBreakout};
use crate::config::{ConfigError, StrategyConfig, StrategyKind};

/// Build the entry strategy a config asks for. The config is validated first.
pub fn create_strategy(cfg: &StrategyConfig) -> Result<Box<dyn EntryStrategy>, ConfigError> {
    cfg.validate()?;
    Ok(match cfg.strategy.kind {
        StrategyKind::PullbackBreakout => Box::new(PullbackBreakout::from_config(cfg)),
        StrategyKind::DirectCrossover => Box::new(DirectCrossover::from_config(cfg)),
    })
}
