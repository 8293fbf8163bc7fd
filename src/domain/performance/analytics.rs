//! Backtest analytics: returns, CAGR, Sharpe, max-drawdown and trade
//! statistics from the snapshot/trade ledgers, plus stage-conditioned
//! cohort and cross-tabulation reporting views.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::performance::stats::{DEFAULT_ANNUAL_RISK_FREE_RATE, Stats};
use crate::domain::trading::portfolio::Snapshot;
use crate::domain::trading::types::Trade;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownReport {
    pub max_drawdown_pct: Decimal,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    pub recovery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_return_pct: Decimal,
    pub cagr_pct: Decimal,
    pub sharpe_ratio: Decimal,
    pub max_drawdown: Option<DrawdownReport>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub profit_factor: Decimal,
}

pub fn total_return_pct(snapshots: &[Snapshot]) -> Decimal {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return Decimal::ZERO;
    };
    if first.equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (last.equity - first.equity) / first.equity * dec!(100)
}

/// `(last/first)^(252/days) - 1`, expressed in percent, where `days` is the
/// number of snapshots (trading days) in the run rather than the calendar
/// span between them.
pub fn cagr_pct(snapshots: &[Snapshot]) -> Decimal {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return Decimal::ZERO;
    };
    if first.equity <= Decimal::ZERO || last.equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let days = snapshots.len().max(1) as f64;
    let ratio = (last.equity / first.equity).to_f64().unwrap_or(1.0);
    let years_exp = 252.0 / days;
    let cagr = ratio.powf(years_exp) - 1.0;
    Decimal::from_f64_retain(cagr).unwrap_or(Decimal::ZERO) * dec!(100)
}

/// Daily simple returns derived from the equity curve.
pub fn daily_returns(snapshots: &[Snapshot]) -> Vec<Decimal> {
    snapshots
        .windows(2)
        .filter_map(|w| {
            if w[0].equity > Decimal::ZERO {
                Some((w[1].equity - w[0].equity) / w[0].equity)
            } else {
                None
            }
        })
        .collect()
}

/// Running peak / max-drawdown with peak/trough/recovery dates.
/// `recovery_date` is `None` if equity never returns to the prior peak.
pub fn max_drawdown(snapshots: &[Snapshot]) -> DrawdownReport {
    let mut peak = Decimal::MIN;
    let mut peak_date = None;
    let mut worst_pct = Decimal::ZERO;
    let mut worst_peak_date = None;
    let mut worst_trough_date = None;
    let mut recovery_date = None;
    let mut awaiting_recovery = false;

    for snap in snapshots {
        if snap.equity > peak {
            peak = snap.equity;
            peak_date = Some(snap.date);
            if awaiting_recovery {
                recovery_date = Some(snap.date);
                awaiting_recovery = false;
            }
        }
        if peak > Decimal::ZERO {
            let drawdown = (snap.equity - peak) / peak * dec!(100);
            if drawdown < worst_pct {
                worst_pct = drawdown;
                worst_peak_date = peak_date;
                worst_trough_date = Some(snap.date);
                awaiting_recovery = true;
                recovery_date = None;
            }
        }
    }

    DrawdownReport {
        max_drawdown_pct: worst_pct,
        peak_date: worst_peak_date,
        trough_date: worst_trough_date,
        recovery_date,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub profit_factor: Decimal,
}

pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    let total_trades = trades.len();
    let wins: Vec<&Trade> = trades.iter().filter(|t| t.pnl > Decimal::ZERO).collect();
    let losses: Vec<&Trade> = trades.iter().filter(|t| t.pnl < Decimal::ZERO).collect();
    let winning_trades = wins.len();
    let losing_trades = losses.len();

    let win_rate_pct = if total_trades > 0 {
        Decimal::from(winning_trades * 100) / Decimal::from(total_trades)
    } else {
        Decimal::ZERO
    };

    let average_win = if winning_trades > 0 {
        wins.iter().map(|t| t.pnl).sum::<Decimal>() / Decimal::from(winning_trades)
    } else {
        Decimal::ZERO
    };
    let average_loss = if losing_trades > 0 {
        losses.iter().map(|t| t.pnl).sum::<Decimal>() / Decimal::from(losing_trades)
    } else {
        Decimal::ZERO
    };

    let gross_profit: Decimal = wins.iter().map(|t| t.pnl).sum();
    let gross_loss: Decimal = losses.iter().map(|t| t.pnl).sum::<Decimal>().abs();
    let profit_factor = if gross_loss > Decimal::ZERO {
        gross_profit / gross_loss
    } else if gross_profit > Decimal::ZERO {
        Decimal::MAX
    } else {
        Decimal::ZERO
    };

    TradeStats {
        total_trades,
        winning_trades,
        losing_trades,
        win_rate_pct,
        average_win,
        average_loss,
        profit_factor,
    }
}

pub fn build_report(snapshots: &[Snapshot], trades: &[Trade]) -> AnalyticsReport {
    let returns = daily_returns(snapshots);
    let sharpe_ratio = Stats::sharpe_ratio(&returns, true, DEFAULT_ANNUAL_RISK_FREE_RATE);
    let stats = trade_stats(trades);
    AnalyticsReport {
        total_return_pct: total_return_pct(snapshots),
        cagr_pct: cagr_pct(snapshots),
        sharpe_ratio,
        max_drawdown: Some(max_drawdown(snapshots)),
        total_trades: stats.total_trades,
        winning_trades: stats.winning_trades,
        losing_trades: stats.losing_trades,
        win_rate_pct: stats.win_rate_pct,
        average_win: stats.average_win,
        average_loss: stats.average_loss,
        profit_factor: stats.profit_factor,
    }
}

/// Stage-cohort breakdown for a chosen entry stage (typically 6 or 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCohort {
    pub stage: u8,
    pub trade_count: usize,
    pub win_rate_pct: Decimal,
    pub average_pnl: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub average_holding_days_win: Decimal,
    pub average_holding_days_loss: Decimal,
}

pub fn stage_cohort(trades: &[Trade], stage: u8) -> StageCohort {
    let cohort: Vec<&Trade> = trades.iter().filter(|t| t.entry_stage == stage).collect();
    let stats = trade_stats(&cohort.iter().map(|t| (*t).clone()).collect::<Vec<_>>());
    let wins: Vec<&&Trade> = cohort.iter().filter(|t| t.pnl > Decimal::ZERO).collect();
    let losses: Vec<&&Trade> = cohort.iter().filter(|t| t.pnl < Decimal::ZERO).collect();

    let avg_days = |group: &[&&Trade]| -> Decimal {
        if group.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(group.iter().map(|t| t.holding_days).sum::<i64>()) / Decimal::from(group.len())
        }
    };

    StageCohort {
        stage,
        trade_count: cohort.len(),
        win_rate_pct: stats.win_rate_pct,
        average_pnl: if cohort.is_empty() {
            Decimal::ZERO
        } else {
            cohort.iter().map(|t| t.pnl).sum::<Decimal>() / Decimal::from(cohort.len())
        },
        average_win: stats.average_win,
        average_loss: stats.average_loss,
        average_holding_days_win: avg_days(&wins),
        average_holding_days_loss: avg_days(&losses),
    }
}

/// Trade count and mean pnl for every `(entry_stage, exit_reason)` pair.
pub fn stage_exit_reason_crosstab(trades: &[Trade]) -> HashMap<(u8, String), (usize, Decimal)> {
    let mut table: HashMap<(u8, String), (usize, Decimal)> = HashMap::new();
    for trade in trades {
        let key = (trade.entry_stage, trade.reason.clone());
        let entry = table.entry(key).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += trade.pnl;
    }
    for value in table.values_mut() {
        if value.0 > 0 {
            value.1 /= Decimal::from(value.0);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::OrderSide;

    fn snap(date: NaiveDate, equity: Decimal) -> Snapshot {
        Snapshot { date, cash: equity, equity, open_count: 0 }
    }

    #[test]
    fn total_return_is_percent_change_first_to_last() {
        let snapshots = vec![
            snap(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), dec!(100000)),
            snap(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), dec!(110000)),
        ];
        assert_eq!(total_return_pct(&snapshots), dec!(10));
    }

    #[test]
    fn max_drawdown_tracks_peak_trough_and_recovery() {
        let snapshots = vec![
            snap(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), dec!(100)),
            snap(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), dec!(120)),
            snap(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), dec!(90)),
            snap(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(), dec!(130)),
        ];
        let report = max_drawdown(&snapshots);
        assert_eq!(report.peak_date, Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert_eq!(report.trough_date, Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()));
        assert_eq!(report.recovery_date, Some(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
    }

    fn trade(stage: u8, pnl: Decimal, reason: &str) -> Trade {
        Trade {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ticker: "005930".into(),
            action: OrderSide::Sell,
            shares: dec!(10),
            entry_price: dec!(100),
            exit_price: dec!(100) + pnl / dec!(10),
            pnl,
            return_pct: Decimal::ZERO,
            holding_days: 5,
            reason: reason.to_string(),
            commission: dec!(1),
            entry_stage: stage,
            entry_strategy: "normal_buy".into(),
            signal_strength_at_entry: dec!(80),
        }
    }

    #[test]
    fn profit_factor_is_gross_profit_over_gross_loss() {
        let trades = vec![trade(6, dec!(100), "exit_signal(lower)"), trade(6, dec!(-50), "stop_loss(volatility)")];
        let stats = trade_stats(&trades);
        assert_eq!(stats.profit_factor, dec!(2));
    }

    #[test]
    fn stage_cohort_filters_by_entry_stage() {
        let trades = vec![trade(6, dec!(100), "exit_signal(lower)"), trade(3, dec!(-50), "stop_loss(volatility)")];
        let cohort = stage_cohort(&trades, 6);
        assert_eq!(cohort.trade_count, 1);
        assert_eq!(cohort.average_pnl, dec!(100));
    }
}
