//! Turtle-style volatility position sizing with signal-strength scaling and
//! a capital-ratio cap.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

use crate::domain::errors::RiskInputError;

/// `round(account_balance * risk_percentage / atr)`.
pub fn calculate_unit_size(
    account_balance: Decimal,
    atr: Decimal,
    risk_percentage: Decimal,
) -> Result<Decimal, RiskInputError> {
    if account_balance <= Decimal::ZERO {
        return Err(RiskInputError::NonPositiveBalance(account_balance));
    }
    if atr <= Decimal::ZERO {
        return Err(RiskInputError::NonPositiveAtr(atr));
    }
    if risk_percentage <= Decimal::ZERO || risk_percentage > Decimal::ONE {
        return Err(RiskInputError::InvalidRiskPercentage(risk_percentage));
    }
    Ok((account_balance * risk_percentage / atr).round())
}

/// Strength-scaling multiplier: 100%/75%/50%/25%/0% as strength crosses
/// `threshold`, `threshold-10`, `threshold-20`, `threshold-30`.
pub fn strength_multiplier(signal_strength: Decimal, threshold: Decimal) -> Decimal {
    if signal_strength >= threshold {
        Decimal::ONE
    } else if signal_strength >= threshold - dec!(10) {
        dec!(0.75)
    } else if signal_strength >= threshold - dec!(20) {
        dec!(0.5)
    } else if signal_strength >= threshold - dec!(30) {
        dec!(0.25)
    } else {
        Decimal::ZERO
    }
}

/// `int(base_units * multiplier)` (floored, matching Python's `int()`).
pub fn adjust_by_signal_strength(base_units: Decimal, signal_strength: Decimal, threshold: Decimal) -> Decimal {
    (base_units * strength_multiplier(signal_strength, threshold)).floor()
}

/// `floor(account_balance * max_capital_ratio / current_price)`.
pub fn max_position_by_capital(account_balance: Decimal, current_price: Decimal, max_capital_ratio: Decimal) -> Decimal {
    if current_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (account_balance * max_capital_ratio / current_price).floor()
}

#[derive(Debug, Clone, Copy)]
pub struct SizingResult {
    pub shares: Decimal,
    pub units: u32,
    pub unit_value: Decimal,
}

/// Composes unit sizing, strength scaling and the capital cap into a final
/// share count and unit count (`max(1, shares/unit_value)` when shares > 0).
///
/// `desired_units_per_signal` targets that many turtle units per approved
/// signal before strength scaling narrows it back down; a signal at full
/// strength (≥ `strength_threshold`) ends up with exactly that many units
/// unless the capital cap binds first.
pub fn calculate_position_size(
    account_balance: Decimal,
    atr: Decimal,
    current_price: Decimal,
    signal_strength: Decimal,
    risk_percentage: Decimal,
    strength_threshold: Decimal,
    max_capital_ratio: Decimal,
    desired_units_per_signal: u32,
) -> Result<SizingResult, RiskInputError> {
    let unit_value = calculate_unit_size(account_balance, atr, risk_percentage)?;
    let base_shares = unit_value * Decimal::from(desired_units_per_signal.max(1));
    let scaled = adjust_by_signal_strength(base_shares, signal_strength, strength_threshold);
    let capital_cap = max_position_by_capital(account_balance, current_price, max_capital_ratio);
    let shares = scaled.min(capital_cap).max(Decimal::ZERO);

    let units = if shares > Decimal::ZERO && unit_value > Decimal::ZERO {
        (shares / unit_value).floor().max(Decimal::ONE)
    } else {
        Decimal::ZERO
    };

    Ok(SizingResult {
        shares,
        units: units.to_u32().unwrap_or(0),
        unit_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turtle_unit_scales_inversely_with_atr() {
        assert_eq!(calculate_unit_size(dec!(10_000_000), dec!(1_000), dec!(0.01)).unwrap(), dec!(100));
        assert_eq!(calculate_unit_size(dec!(10_000_000), dec!(2_000), dec!(0.01)).unwrap(), dec!(50));
    }

    #[test]
    fn signal_scaling_matches_thresholds() {
        assert_eq!(adjust_by_signal_strength(dec!(100), dec!(85), dec!(80)), dec!(100));
        assert_eq!(adjust_by_signal_strength(dec!(100), dec!(75), dec!(80)), dec!(75));
        assert_eq!(adjust_by_signal_strength(dec!(100), dec!(65), dec!(80)), dec!(50));
        assert_eq!(adjust_by_signal_strength(dec!(100), dec!(55), dec!(80)), dec!(25));
        assert_eq!(adjust_by_signal_strength(dec!(100), dec!(45), dec!(80)), dec!(0));
    }

    #[test]
    fn position_size_targets_desired_units_at_full_strength() {
        let result = calculate_position_size(
            dec!(10_000_000),
            dec!(1_000),
            dec!(100),
            dec!(90),
            dec!(0.01),
            dec!(80),
            dec!(0.25),
            2,
        )
        .unwrap();
        assert_eq!(result.unit_value, dec!(100));
        assert_eq!(result.shares, dec!(200));
        assert_eq!(result.units, 2);
    }

    #[test]
    fn position_size_is_capped_by_capital_even_with_desired_units() {
        let result = calculate_position_size(
            dec!(100_000_000),
            dec!(1_000),
            dec!(50_000),
            dec!(90),
            dec!(0.01),
            dec!(80),
            dec!(0.25),
            2,
        )
        .unwrap();
        // unit_value=1000, base_shares=2000, but the capital cap (500) binds.
        assert_eq!(result.shares, dec!(500));
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(calculate_unit_size(dec!(0), dec!(1), dec!(0.01)).is_err());
        assert!(calculate_unit_size(dec!(1000), dec!(0), dec!(0.01)).is_err());
        assert!(calculate_unit_size(dec!(1000), dec!(1), dec!(1.5)).is_err());
    }
}
