//! Per-position and portfolio-level risk exposure and limit checks.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::errors::RiskInputError;
use crate::domain::trading::types::Side;

/// `shares * |entry - stop|`, validated so the stop sits on the correct
/// side of entry.
pub fn position_risk(shares: Decimal, entry_price: Decimal, stop_price: Decimal, side: Side) -> Result<Decimal, RiskInputError> {
    let valid = match side {
        Side::Long => stop_price <= entry_price,
        Side::Short => stop_price >= entry_price,
    };
    if !valid {
        return Err(RiskInputError::InvalidStop { entry: entry_price, stop: stop_price, side });
    }
    Ok(shares * (entry_price - stop_price).abs())
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioRisk {
    pub total_risk: Decimal,
    pub risk_by_ticker: HashMap<String, Decimal>,
    pub largest_risk_ticker: Option<String>,
}

/// Sums risk across a set of `(ticker, shares, entry, stop, side)` tuples,
/// skipping (and letting the caller log) any with an invalid stop.
pub fn total_portfolio_risk(positions: &[(String, Decimal, Decimal, Decimal, Side)]) -> PortfolioRisk {
    let mut report = PortfolioRisk::default();
    for (ticker, shares, entry, stop, side) in positions {
        if let Ok(risk) = position_risk(*shares, *entry, *stop, *side) {
            report.total_risk += risk;
            report.risk_by_ticker.insert(ticker.clone(), risk);
            let is_largest = report
                .largest_risk_ticker
                .as_ref()
                .map(|t| report.risk_by_ticker[t] < risk)
                .unwrap_or(true);
            if is_largest {
                report.largest_risk_ticker = Some(ticker.clone());
            }
        }
    }
    report
}

#[derive(Debug, Clone)]
pub struct RiskLimitCheck {
    pub within_limits: bool,
    pub total_risk_ok: bool,
    pub single_risk_ok: Option<bool>,
    pub warnings: Vec<String>,
}

pub fn check_risk_limits(
    total_risk: Decimal,
    account_balance: Decimal,
    new_position_risk: Option<Decimal>,
    max_risk_percentage: Decimal,
    max_single_risk: Decimal,
) -> RiskLimitCheck {
    let total_limit = account_balance * max_risk_percentage;
    let total_risk_ok = total_risk <= total_limit;

    let mut warnings = Vec::new();
    if total_risk >= total_limit * dec!(0.9) {
        warnings.push(format!(
            "portfolio risk {total_risk} is within 90% of the {max_risk_percentage} limit"
        ));
    }

    let single_risk_ok = new_position_risk.map(|risk| {
        let single_limit = account_balance * max_single_risk;
        let ok = risk <= single_limit;
        if risk >= single_limit * dec!(0.9) {
            warnings.push(format!(
                "position risk {risk} is within 90% of the {max_single_risk} single-position limit"
            ));
        }
        ok
    });

    RiskLimitCheck {
        within_limits: total_risk_ok && single_risk_ok.unwrap_or(true),
        total_risk_ok,
        single_risk_ok,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_risk_rejects_stop_on_wrong_side_for_long() {
        assert!(position_risk(dec!(10), dec!(100), dec!(110), Side::Long).is_err());
    }

    #[test]
    fn position_risk_computes_directional_distance() {
        let risk = position_risk(dec!(10), dec!(100), dec!(90), Side::Long).unwrap();
        assert_eq!(risk, dec!(100));
    }

    #[test]
    fn risk_limit_check_flags_breach() {
        let check = check_risk_limits(dec!(3000), dec!(100_000), None, dec!(0.02), dec!(0.01));
        assert!(!check.total_risk_ok);
        assert!(!check.within_limits);
    }
}
