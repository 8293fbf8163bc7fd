//! Risk gate: composes sizing, the four-tier portfolio limits, stop-loss
//! selection and exposure checks into a single approve/reject decision for
//! a candidate entry signal.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::risk::limits::{self, CorrelationGroups, LimitTier, PortfolioLimits};
use crate::domain::risk::stop_loss::{self, StopLossResult};
use crate::domain::risk::{exposure, sizing};
use crate::domain::trading::types::{Side, StopKind};

#[derive(Debug, Clone, Copy)]
pub struct RiskGateConfig {
    pub risk_percentage: Decimal,
    pub signal_strength_threshold: Decimal,
    pub atr_multiplier: Decimal,
    pub max_capital_ratio: Decimal,
    pub max_risk_percentage: Decimal,
    pub max_single_risk: Decimal,
    pub limits: PortfolioLimits,
    pub desired_units_per_signal: u32,
}

/// A candidate entry: a ticker the scanner wants to open or add to.
pub struct EntryCandidate<'a> {
    pub ticker: &'a str,
    pub side: Side,
    pub signal_strength: Decimal,
    pub current_price: Decimal,
    pub atr: Decimal,
    pub trend_stop: Option<Decimal>,
}

/// Environment the gate needs to evaluate a candidate: account equity and
/// every open position's current unit count, keyed by ticker.
pub struct RiskEnvironment<'a> {
    pub account_balance: Decimal,
    pub units_by_ticker: &'a HashMap<String, u32>,
    pub existing_risk: Decimal,
    pub correlation_groups: &'a CorrelationGroups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedEntry {
    pub shares: Decimal,
    pub units: u32,
    pub stop_price: Decimal,
    pub stop_kind: StopKind,
    pub risk_amount: Decimal,
    pub risk_pct: Decimal,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    SignalTooWeak,
    PortfolioLimit(String),
    RiskLimitExceeded,
}

pub type GateDecision = Result<ApprovedEntry, RejectionReason>;

/// Runs §4.11's seven-step procedure for a single candidate. Exits are
/// approved unconditionally with zero size by the caller before reaching
/// this function; this is the entry-only path.
pub fn evaluate_entry(candidate: &EntryCandidate<'_>, env: &RiskEnvironment<'_>, config: &RiskGateConfig) -> GateDecision {
    let sizing = sizing::calculate_position_size(
        env.account_balance,
        candidate.atr,
        candidate.current_price,
        candidate.signal_strength,
        config.risk_percentage,
        config.signal_strength_threshold,
        config.max_capital_ratio,
        config.desired_units_per_signal,
    )
    .map_err(|_| RejectionReason::SignalTooWeak)?;

    if sizing.units == 0 || sizing.shares <= Decimal::ZERO {
        return Err(RejectionReason::SignalTooWeak);
    }

    let feasible = limits::get_available_position_size(
        candidate.ticker,
        sizing.units,
        env.units_by_ticker,
        env.correlation_groups,
        config.limits,
    );

    if feasible.allowed_units == 0 {
        return Err(RejectionReason::PortfolioLimit(tier_name(&feasible.limiting_factor)));
    }

    let mut warnings = Vec::new();
    let (shares, units) = if feasible.allowed_units < sizing.units {
        warnings.push(format!(
            "clamped from {} to {} units by {} limit",
            sizing.units,
            feasible.allowed_units,
            tier_name(&feasible.limiting_factor)
        ));
        let scale = Decimal::from(feasible.allowed_units) / Decimal::from(sizing.units);
        (sizing.shares * scale, feasible.allowed_units)
    } else {
        (sizing.shares, sizing.units)
    };

    let StopLossResult { stop_price, stop_kind, .. } = stop_loss::get_stop_loss_price(
        candidate.current_price,
        candidate.atr,
        candidate.trend_stop,
        candidate.side,
        config.atr_multiplier,
    );

    let risk_amount = exposure::position_risk(shares, candidate.current_price, stop_price, candidate.side)
        .map_err(|_| RejectionReason::RiskLimitExceeded)?;

    let check = exposure::check_risk_limits(
        env.existing_risk + risk_amount,
        env.account_balance,
        Some(risk_amount),
        config.max_risk_percentage,
        config.max_single_risk,
    );
    warnings.extend(check.warnings);

    if !check.within_limits {
        return Err(RejectionReason::RiskLimitExceeded);
    }

    let risk_pct = if env.account_balance > Decimal::ZERO {
        risk_amount / env.account_balance
    } else {
        Decimal::ZERO
    };

    Ok(ApprovedEntry {
        shares,
        units,
        stop_price,
        stop_kind,
        risk_amount,
        risk_pct,
        warnings,
    })
}

fn tier_name(tier: &LimitTier) -> String {
    match tier {
        LimitTier::Single => "single".to_string(),
        LimitTier::Correlated => "correlated".to_string(),
        LimitTier::Diversified => "diversified".to_string(),
        LimitTier::Total => "total".to_string(),
        LimitTier::None => "none".to_string(),
    }
}
