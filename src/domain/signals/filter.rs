//! Signal filters: strength, volatility, trend-slope and entry/exit conflict.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::frame::IndicatorFrame;
use crate::domain::signals::entry::EntrySignal;
use crate::domain::signals::exit::ExitSignal;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterConfig {
    pub enable_strength: bool,
    pub enable_volatility: bool,
    pub enable_trend: bool,
    pub enable_conflict: bool,
    pub min_strength: Decimal,
    pub max_atr_percentile: Decimal,
    pub min_trend_slope: Decimal,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_strength: true,
            enable_volatility: true,
            enable_trend: true,
            enable_conflict: true,
            min_strength: dec!(50),
            max_atr_percentile: dec!(90),
            min_trend_slope: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterResult {
    pub passed: bool,
    pub failed_filters: Vec<String>,
}

fn check_strength(strength: Decimal, min_strength: Decimal) -> bool {
    strength >= min_strength
}

fn check_volatility(atr_percentile: Option<Decimal>, max_pct: Decimal) -> bool {
    match atr_percentile {
        Some(p) => p <= max_pct,
        None => true,
    }
}

fn check_trend(slope_normalized_pct: Option<Decimal>, min_slope: Decimal) -> bool {
    match slope_normalized_pct {
        Some(s) => s.abs() >= min_slope,
        None => true,
    }
}

fn check_conflict(entry: EntrySignal, exit: ExitSignal) -> bool {
    !(entry.code() != 0 && exit.level != 0)
}

/// Applies every enabled filter and returns the combined pass/fail verdict
/// plus which filters failed.
pub fn apply_signal_filters(
    frame: &IndicatorFrame,
    idx: usize,
    strength: Decimal,
    entry: EntrySignal,
    exit: ExitSignal,
    config: &FilterConfig,
) -> FilterResult {
    let mut failed = Vec::new();

    if config.enable_strength && !check_strength(strength, config.min_strength) {
        failed.push("strength".to_string());
    }
    if config.enable_volatility && !check_volatility(frame.atr_percentile[idx], config.max_atr_percentile) {
        failed.push("volatility".to_string());
    }
    if config.enable_trend {
        let slope_pct = frame.slope_long[idx].and_then(|s| {
            if frame.close[idx] > Decimal::ZERO {
                Some(s / frame.close[idx] * dec!(100))
            } else {
                None
            }
        });
        if !check_trend(slope_pct, config.min_trend_slope) {
            failed.push("trend".to_string());
        }
    }
    if config.enable_conflict && !check_conflict(entry, exit) {
        failed.push("conflict".to_string());
    }

    FilterResult {
        passed: failed.is_empty(),
        failed_filters: failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signals::exit::ExitSignal;

    #[test]
    fn strength_filter_rejects_below_threshold() {
        assert!(!check_strength(dec!(49), dec!(50)));
        assert!(check_strength(dec!(50), dec!(50)));
    }

    #[test]
    fn missing_columns_pass_unconditionally() {
        assert!(check_volatility(None, dec!(90)));
        assert!(check_trend(None, dec!(0.1)));
    }

    #[test]
    fn conflict_filter_fails_only_when_both_signals_present() {
        assert!(check_conflict(EntrySignal::NormalBuy, ExitSignal::none()));
        assert!(!check_conflict(
            EntrySignal::NormalBuy,
            ExitSignal { level: 1, ratio: 0, source: "upper" }
        ));
    }
}
