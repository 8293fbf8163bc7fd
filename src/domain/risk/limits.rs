//! Four-tier portfolio unit limits: single position, correlated group,
//! diversified (all groups + ungrouped), and total exposure.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortfolioLimits {
    pub single: u32,
    pub correlated: u32,
    pub diversified: u32,
    pub total: u32,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self { single: 4, correlated: 6, diversified: 10, total: 12 }
    }
}

pub type CorrelationGroups = HashMap<String, HashSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitTier {
    Single,
    Correlated,
    Diversified,
    Total,
    None,
}

fn groups_for(ticker: &str, groups: &CorrelationGroups) -> Vec<&String> {
    groups
        .iter()
        .filter(|(_, members)| members.contains(ticker))
        .map(|(name, _)| name)
        .collect()
}

fn group_units(group: &HashSet<String>, positions: &HashMap<String, u32>) -> u32 {
    group.iter().map(|t| positions.get(t).copied().unwrap_or(0)).sum()
}

pub fn available_single(current_units: u32, limit: u32) -> u32 {
    limit.saturating_sub(current_units)
}

/// Tightest correlated group containing `ticker` binds; tickers with no
/// group auto-pass at the configured limit.
pub fn available_correlated(ticker: &str, positions: &HashMap<String, u32>, groups: &CorrelationGroups, limit: u32) -> u32 {
    let memberships = groups_for(ticker, groups);
    if memberships.is_empty() {
        return limit;
    }
    memberships
        .iter()
        .map(|name| {
            let members = &groups[*name];
            limit.saturating_sub(group_units(members, positions))
        })
        .min()
        .unwrap_or(limit)
}

/// Sum of units per group counted once, plus ungrouped tickers.
pub fn diversified_total(positions: &HashMap<String, u32>, groups: &CorrelationGroups) -> u32 {
    let grouped_tickers: HashSet<&String> = groups.values().flatten().collect();
    let group_sum: u32 = groups.values().map(|members| group_units(members, positions)).sum();
    let ungrouped_sum: u32 = positions
        .iter()
        .filter(|(t, _)| !grouped_tickers.contains(t))
        .map(|(_, u)| *u)
        .sum();
    group_sum + ungrouped_sum
}

pub fn available_diversified(positions: &HashMap<String, u32>, groups: &CorrelationGroups, limit: u32) -> u32 {
    limit.saturating_sub(diversified_total(positions, groups))
}

pub fn available_total(positions: &HashMap<String, u32>, limit: u32) -> u32 {
    let total: u32 = positions.values().sum();
    limit.saturating_sub(total)
}

#[derive(Debug, Clone)]
pub struct FeasibleSize {
    pub allowed_units: u32,
    pub limiting_factor: LimitTier,
}

/// Runs all four tiers and returns the tightest-binding allowance, capped at
/// `desired_units`.
pub fn get_available_position_size(
    ticker: &str,
    desired_units: u32,
    positions: &HashMap<String, u32>,
    groups: &CorrelationGroups,
    limits: PortfolioLimits,
) -> FeasibleSize {
    let current = positions.get(ticker).copied().unwrap_or(0);
    let candidates = [
        (LimitTier::Single, available_single(current, limits.single)),
        (LimitTier::Correlated, available_correlated(ticker, positions, groups, limits.correlated)),
        (LimitTier::Diversified, available_diversified(positions, groups, limits.diversified)),
        (LimitTier::Total, available_total(positions, limits.total)),
    ];

    let mut allowed = desired_units;
    let mut limiting = LimitTier::None;
    for (tier, available) in candidates {
        if available < allowed {
            allowed = available;
            limiting = tier;
        }
    }
    FeasibleSize { allowed_units: allowed, limiting_factor: limiting }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> CorrelationGroups {
        let mut g = HashMap::new();
        g.insert(
            "semiconductors".to_string(),
            HashSet::from(["005930".to_string(), "000660".to_string()]),
        );
        g
    }

    #[test]
    fn correlated_tier_binds_when_tightest() {
        let mut positions = HashMap::new();
        positions.insert("005930".to_string(), 3);
        positions.insert("000660".to_string(), 2);
        let groups = groups();
        let result = get_available_position_size("005930", 2, &positions, &groups, PortfolioLimits::default());
        assert_eq!(result.allowed_units, 1);
        assert_eq!(result.limiting_factor, LimitTier::Correlated);
    }

    #[test]
    fn diversified_counts_each_group_once_plus_ungrouped() {
        let mut positions = HashMap::new();
        positions.insert("005930".to_string(), 2);
        positions.insert("000660".to_string(), 2);
        positions.insert("035720".to_string(), 3); // ungrouped
        let groups = groups();
        assert_eq!(diversified_total(&positions, &groups), 4 + 3);
    }

    #[test]
    fn ungrouped_ticker_auto_passes_correlated_tier() {
        let positions = HashMap::new();
        let groups = groups();
        assert_eq!(available_correlated("999999", &positions, &groups, 6), 6);
    }
}
