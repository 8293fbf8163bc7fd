//! Typed configuration for the backtest engine, loadable from the process
//! environment (`Config::from_env`) or built directly for tests.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::domain::frame::IndicatorParams;
use crate::domain::risk::limits::{CorrelationGroups, PortfolioLimits};
use crate::domain::signals::exit::ExitMergeStrategy;
use crate::domain::signals::filter::FilterConfig;

/// Execution and bookkeeping knobs (§6, commission/slippage/early-signal block).
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub commission_rate: Decimal,
    pub slippage_pct: Decimal,
    pub enable_early_signals: bool,
    pub use_cache: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(15, 5), // 0.00015
            slippage_pct: Decimal::new(1, 3),      // 0.001
            enable_early_signals: false,
            use_cache: true,
        }
    }
}

/// The risk block (§6).
#[derive(Debug, Clone)]
pub struct RiskBlock {
    pub risk_percentage: Decimal,
    pub desired_units_per_signal: u32,
    pub signal_strength_threshold: Decimal,
    pub atr_multiplier: Decimal,
    pub limits: PortfolioLimits,
    pub correlation_groups: CorrelationGroups,
    pub max_risk_percentage: Decimal,
    pub max_single_risk: Decimal,
    pub max_capital_ratio: Decimal,
}

impl Default for RiskBlock {
    fn default() -> Self {
        Self {
            risk_percentage: Decimal::new(1, 2), // 0.01
            desired_units_per_signal: 2,
            signal_strength_threshold: Decimal::from(80),
            atr_multiplier: Decimal::from(2),
            limits: PortfolioLimits::default(),
            correlation_groups: CorrelationGroups::new(),
            max_risk_percentage: Decimal::new(2, 2),  // 0.02
            max_single_risk: Decimal::new(1, 2),      // 0.01
            max_capital_ratio: Decimal::new(25, 2),   // 0.25
        }
    }
}

/// Concurrency knobs for the data-loading phase (§6).
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyBlock {
    pub loader_concurrency: usize,
}

impl Default for ConcurrencyBlock {
    fn default() -> Self {
        Self { loader_concurrency: 10 }
    }
}

/// Top-level backtest configuration: everything the simulation driver and
/// the risk gate need that isn't derived from market data itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub initial_capital: Decimal,
    pub execution: ExecutionConfig,
    pub risk: RiskBlock,
    pub indicators: IndicatorParams,
    pub filters: FilterConfig,
    pub exit_merge_strategy: ExitMergeStrategy,
    pub concurrency: ConcurrencyBlock,
    pub cache_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(100_000_000),
            execution: ExecutionConfig::default(),
            risk: RiskBlock::default(),
            indicators: IndicatorParams::default(),
            filters: FilterConfig::default(),
            exit_merge_strategy: ExitMergeStrategy::default(),
            concurrency: ConcurrencyBlock::default(),
            cache_dir: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().with_context(|| format!("invalid {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn env_decimal(key: &str, default: Decimal) -> Result<Decimal> {
    match env::var(key) {
        Ok(raw) => raw.parse::<Decimal>().with_context(|| format!("invalid {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads every recognised knob from the environment, falling back to
    /// the documented default for anything unset. Parse failures fail the
    /// call (§7 input-validation error kind); nothing is silently defaulted
    /// on a malformed value.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            initial_capital: env_decimal("BACKTEST_INITIAL_CAPITAL", defaults.initial_capital)?,
            execution: ExecutionConfig {
                commission_rate: env_decimal("BACKTEST_COMMISSION_RATE", defaults.execution.commission_rate)?,
                slippage_pct: env_decimal("BACKTEST_SLIPPAGE_PCT", defaults.execution.slippage_pct)?,
                enable_early_signals: env_parse("BACKTEST_ENABLE_EARLY_SIGNALS", defaults.execution.enable_early_signals)?,
                use_cache: env_parse("BACKTEST_USE_CACHE", defaults.execution.use_cache)?,
            },
            risk: RiskBlock {
                risk_percentage: env_decimal("BACKTEST_RISK_PERCENTAGE", defaults.risk.risk_percentage)?,
                desired_units_per_signal: env_parse("BACKTEST_DESIRED_UNITS_PER_SIGNAL", defaults.risk.desired_units_per_signal)?,
                signal_strength_threshold: env_decimal(
                    "BACKTEST_SIGNAL_STRENGTH_THRESHOLD",
                    defaults.risk.signal_strength_threshold,
                )?,
                atr_multiplier: env_decimal("BACKTEST_ATR_MULTIPLIER", defaults.risk.atr_multiplier)?,
                limits: defaults.risk.limits,
                correlation_groups: HashMap::new(),
                max_risk_percentage: env_decimal("BACKTEST_MAX_RISK_PERCENTAGE", defaults.risk.max_risk_percentage)?,
                max_single_risk: env_decimal("BACKTEST_MAX_SINGLE_RISK", defaults.risk.max_single_risk)?,
                max_capital_ratio: env_decimal("BACKTEST_MAX_CAPITAL_RATIO", defaults.risk.max_capital_ratio)?,
            },
            indicators: defaults.indicators,
            filters: defaults.filters,
            exit_merge_strategy: defaults.exit_merge_strategy,
            concurrency: ConcurrencyBlock {
                loader_concurrency: env_parse("BACKTEST_LOADER_CONCURRENCY", defaults.concurrency.loader_concurrency)?,
            },
            cache_dir: env::var("BACKTEST_CACHE_DIR").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fatal validation (§7): these abort the run rather than being logged
    /// and skipped.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= Decimal::ZERO {
            anyhow::bail!("initial capital must be positive, got {}", self.initial_capital);
        }
        if self.execution.commission_rate < Decimal::ZERO {
            anyhow::bail!("commission rate must be non-negative, got {}", self.execution.commission_rate);
        }
        if self.execution.slippage_pct < Decimal::ZERO {
            anyhow::bail!("slippage must be non-negative, got {}", self.execution.slippage_pct);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.execution.commission_rate, dec!(0.00015));
        assert_eq!(config.execution.slippage_pct, dec!(0.001));
        assert_eq!(config.risk.risk_percentage, dec!(0.01));
        assert_eq!(config.risk.max_risk_percentage, dec!(0.02));
        assert_eq!(config.risk.max_single_risk, dec!(0.01));
        assert_eq!(config.risk.max_capital_ratio, dec!(0.25));
        assert_eq!(config.risk.limits.single, 4);
        assert_eq!(config.risk.limits.total, 12);
    }

    #[test]
    fn fatal_validation_rejects_non_positive_capital() {
        let mut config = Config::default();
        config.initial_capital = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fatal_validation_rejects_negative_commission() {
        let mut config = Config::default();
        config.execution.commission_rate = dec!(-0.001);
        assert!(config.validate().is_err());
    }
}
