//! The simulation driver (§4.14): a strictly sequential, single-threaded
//! per-day loop over the union of trading dates across the whole universe.
//! Ordering within a day is fixed: stops, then exits, then entries, with
//! entries scanned in sorted ticker order for determinism (§5).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::simulation::execution::{self, ExecutionConfig};
use crate::config::Config;
use crate::domain::errors::FatalError;
use crate::domain::frame::IndicatorFrame;
use crate::domain::performance::analytics::{self, AnalyticsReport};
use crate::domain::risk::gate::{self, EntryCandidate, RiskEnvironment, RiskGateConfig};
use crate::domain::risk::{exposure, stop_loss};
use crate::domain::signals::entry::{self, EntrySignal};
use crate::domain::signals::exit::{self, ExitSignal};
use crate::domain::signals::filter::apply_signal_filters;
use crate::domain::signals::strength::signal_strength;
use crate::domain::trading::portfolio::{Portfolio, Snapshot};
use crate::domain::trading::types::{OrderSide, Position, Side, Trade};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub snapshots: Vec<Snapshot>,
    pub trades: Vec<Trade>,
    pub scanned_ticker_count: usize,
    #[serde(skip)]
    pub analytics: Option<AnalyticsReport>,
}

impl BacktestResult {
    pub fn summary(&self) -> String {
        let return_pct = self.total_return_pct.round_dp(2);
        let drawdown_pct = self.max_drawdown_pct.round_dp(2);
        let win_rate = self.win_rate_pct.round_dp(1);
        format!(
            "Backtest {} -> {}\n  universe:      {} tickers\n  capital:       {} -> {} ({}%)\n  max drawdown:  {}%\n  trades:        {} ({} win / {} loss, {}% win rate)",
            self.start_date,
            self.end_date,
            self.scanned_ticker_count,
            self.initial_capital,
            self.final_capital,
            return_pct,
            drawdown_pct,
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            win_rate,
        )
    }
}

fn risk_gate_config(config: &Config) -> RiskGateConfig {
    RiskGateConfig {
        risk_percentage: config.risk.risk_percentage,
        signal_strength_threshold: config.risk.signal_strength_threshold,
        atr_multiplier: config.risk.atr_multiplier,
        max_capital_ratio: config.risk.max_capital_ratio,
        max_risk_percentage: config.risk.max_risk_percentage,
        max_single_risk: config.risk.max_single_risk,
        limits: config.risk.limits,
        desired_units_per_signal: config.risk.desired_units_per_signal,
    }
}

fn execution_config(config: &Config) -> ExecutionConfig {
    ExecutionConfig {
        slippage_pct: config.execution.slippage_pct,
        commission_rate: config.execution.commission_rate,
    }
}

/// Closes a stop-triggered position at its stop price. A positive-pnl stop
/// exit is reclassified `trailing_stop(<kind>)` per §3's reason taxonomy.
fn close_on_stop(
    portfolio: &mut Portfolio,
    ticker: &str,
    date: NaiveDate,
    exec_config: ExecutionConfig,
) -> Result<Trade, String> {
    let position = portfolio
        .open_positions
        .get(ticker)
        .ok_or_else(|| format!("{ticker}: stop fired but position missing"))?;
    let shares = position.shares;
    let stop_price = position.stop_price;
    let stop_kind = position.stop_kind;
    let entry_price = position.entry_price;

    let fill = execution::execute_market_order(stop_price, shares, OrderSide::Sell, exec_config);
    let prospective_pnl = (fill.fill_price - entry_price) * shares;
    let kind_label = match stop_kind {
        crate::domain::trading::types::StopKind::Volatility => "volatility",
        crate::domain::trading::types::StopKind::Trend => "trend",
    };
    let reason = if prospective_pnl > Decimal::ZERO {
        format!("trailing_stop({kind_label})")
    } else {
        format!("stop_loss({kind_label})")
    };

    portfolio
        .close_position(ticker, shares, fill.fill_price, date, reason, fill.commission)
        .map_err(|e| e.to_string())
}

fn close_on_exit(
    portfolio: &mut Portfolio,
    ticker: &str,
    date: NaiveDate,
    close_price: Decimal,
    exit_signal: ExitSignal,
    exec_config: ExecutionConfig,
) -> Result<Trade, String> {
    let position = portfolio
        .open_positions
        .get(ticker)
        .ok_or_else(|| format!("{ticker}: exit signal fired but position missing"))?;
    let ratio = Decimal::from(exit_signal.ratio) / Decimal::from(100);
    let shares_to_close = position.shares * ratio;

    let fill = execution::execute_market_order(close_price, shares_to_close, OrderSide::Sell, exec_config);
    let reason = format!("exit_signal({})", exit_signal.source);

    portfolio
        .close_position(ticker, shares_to_close, fill.fill_price, date, reason, fill.commission)
        .map_err(|e| e.to_string())
}

/// Current risk exposure of every open position, for the exposure check
/// component of the risk gate.
fn current_portfolio_risk(portfolio: &Portfolio) -> Decimal {
    let tuples: Vec<(String, Decimal, Decimal, Decimal, Side)> = portfolio
        .open_positions
        .values()
        .map(|p| (p.ticker.clone(), p.shares, p.entry_price, p.stop_price, p.side))
        .collect();
    exposure::total_portfolio_risk(&tuples).total_risk
}

/// Runs the full day-by-day simulation over `frames` and returns the
/// resulting ledgers and headline analytics.
pub fn run(frames: &BTreeMap<String, IndicatorFrame>, config: &Config) -> Result<BacktestResult, FatalError> {
    config
        .validate()
        .map_err(|_| FatalError::NonPositiveCapital(config.initial_capital))?;

    if frames.is_empty() {
        return Err(FatalError::EmptyUniverse);
    }

    let dates = crate::application::loader::common_dates(frames);
    let mut portfolio = Portfolio::new(config.initial_capital, config.execution.commission_rate);
    let exec_config = execution_config(config);
    let gate_config = risk_gate_config(config);

    for date in &dates {
        simulate_day(*date, frames, &mut portfolio, config, exec_config, &gate_config);
    }

    let report = analytics::build_report(&portfolio.snapshots, &portfolio.trades);
    let final_capital = portfolio.snapshots.last().map(|s| s.equity).unwrap_or(config.initial_capital);

    Ok(BacktestResult {
        start_date: dates[0],
        end_date: dates[dates.len() - 1],
        initial_capital: config.initial_capital,
        final_capital,
        total_return_pct: report.total_return_pct,
        max_drawdown_pct: report.max_drawdown.as_ref().map(|d| d.max_drawdown_pct).unwrap_or(Decimal::ZERO),
        total_trades: report.total_trades,
        winning_trades: report.winning_trades,
        losing_trades: report.losing_trades,
        win_rate_pct: report.win_rate_pct,
        snapshots: portfolio.snapshots,
        trades: portfolio.trades,
        scanned_ticker_count: frames.len(),
        analytics: Some(report),
    })
}

fn prices_for(frames: &BTreeMap<String, IndicatorFrame>, date: NaiveDate) -> HashMap<String, Decimal> {
    frames
        .iter()
        .filter_map(|(ticker, frame)| frame.index_of(date).map(|idx| (ticker.clone(), frame.close[idx])))
        .collect()
}

fn simulate_day(
    date: NaiveDate,
    frames: &BTreeMap<String, IndicatorFrame>,
    portfolio: &mut Portfolio,
    config: &Config,
    exec_config: ExecutionConfig,
    gate_config: &RiskGateConfig,
) {
    let prices = prices_for(frames, date);

    // Step 2: extend each held position's running high.
    portfolio.update_highest_since_entry(&prices);

    // Step 3+4: recompute trailing stops, then fire any that trigger.
    let mut held_tickers: Vec<String> = portfolio.open_positions.keys().cloned().collect();
    held_tickers.sort();

    let mut triggered = Vec::new();
    for ticker in &held_tickers {
        let Some(&current_price) = prices.get(ticker) else { continue };
        let Some(frame) = frames.get(ticker) else { continue };
        let Some(idx) = frame.index_of(date) else { continue };
        let Some(atr) = frame.atr[idx] else { continue };

        let position = portfolio.open_positions.get_mut(ticker).expect("held ticker must have a position");
        let new_stop = stop_loss::update_trailing_stop(
            position.entry_price,
            position.highest_since_entry,
            position.stop_price,
            atr,
            Side::Long,
            config.risk.atr_multiplier,
        );
        position.stop_price = new_stop;

        if stop_loss::check_stop_loss_triggered(current_price, new_stop, Side::Long) {
            triggered.push(ticker.clone());
        }
    }

    for ticker in &triggered {
        match close_on_stop(portfolio, ticker, date, exec_config) {
            Ok(trade) => debug!(ticker = %ticker, pnl = %trade.pnl, "stop-loss executed"),
            Err(reason) => debug!(ticker = %ticker, reason = %reason, "stop-loss execution failed"),
        }
    }

    // Step 5: exit signals on everything still held.
    let mut still_held: Vec<String> = portfolio.open_positions.keys().cloned().collect();
    still_held.sort();

    for ticker in &still_held {
        let Some(&close_price) = prices.get(ticker) else { continue };
        let Some(frame) = frames.get(ticker) else { continue };
        let Some(idx) = frame.index_of(date) else { continue };

        let exit_signal = exit::generate_exit_signal(frame, idx, Side::Long, config.exit_merge_strategy);
        if exit_signal.level < 2 {
            continue;
        }
        match close_on_exit(portfolio, ticker, date, close_price, exit_signal, exec_config) {
            Ok(trade) => debug!(ticker = %ticker, pnl = %trade.pnl, level = exit_signal.level, "exit signal executed"),
            Err(reason) => debug!(ticker = %ticker, reason = %reason, "exit execution failed"),
        }
    }

    // Step 6: scan the non-held universe for entries, sorted lexicographically.
    for (ticker, frame) in frames.iter() {
        if portfolio.open_positions.contains_key(ticker) {
            continue;
        }
        let Some(&current_price) = prices.get(ticker) else { continue };
        let Some(idx) = frame.index_of(date) else { continue };

        let entry_signal = entry::generate_entry_signal(frame, idx, config.execution.enable_early_signals);
        if matches!(entry_signal, EntrySignal::None) {
            continue;
        }

        let strength = signal_strength(frame, idx);
        let filter_result = apply_signal_filters(frame, idx, strength, entry_signal, ExitSignal::none(), &config.filters);
        if !filter_result.passed {
            debug!(ticker = %ticker, failed = ?filter_result.failed_filters, "entry signal filtered out");
            continue;
        }

        let Some(atr) = frame.atr[idx] else { continue };
        let trend_stop = frame.ema_long[idx];

        let candidate = EntryCandidate {
            ticker: ticker.as_str(),
            side: Side::Long,
            signal_strength: strength,
            current_price,
            atr,
            trend_stop,
        };

        let units_by_ticker = portfolio.units_by_ticker();
        let env = RiskEnvironment {
            account_balance: portfolio.equity(&prices),
            units_by_ticker: &units_by_ticker,
            existing_risk: current_portfolio_risk(portfolio),
            correlation_groups: &config.risk.correlation_groups,
        };

        match gate::evaluate_entry(&candidate, &env, gate_config) {
            Ok(approved) => {
                let fill = execution::execute_market_order(current_price, approved.shares, OrderSide::Buy, exec_config);
                let stage_at_entry = frame.stage[idx].unwrap_or(0);
                let position = Position {
                    ticker: ticker.clone(),
                    side: Side::Long,
                    entry_date: date,
                    entry_price: fill.fill_price,
                    shares: approved.shares,
                    units: approved.units,
                    stop_price: approved.stop_price,
                    stop_kind: approved.stop_kind,
                    highest_since_entry: fill.fill_price,
                    signal_strength_at_entry: strength,
                    stage_at_entry,
                    entry_strategy: entry::entry_strategy_label(entry_signal).to_string(),
                };
                let cost = -fill.cash_delta;
                if let Err(e) = portfolio.add_position(position, cost) {
                    debug!(ticker = %ticker, error = %e, "approved entry failed at execution");
                }
            }
            Err(reason) => {
                debug!(ticker = %ticker, reason = ?reason, "entry rejected by risk gate");
            }
        }
    }

    // Step 7.
    portfolio.record_snapshot(date, &prices);
    info!(date = %date, equity = %portfolio.equity(&prices), open = portfolio.open_positions.len(), "day complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::{Bar, BarSeries};
    use crate::domain::frame::IndicatorParams;
    use rust_decimal_macros::dec;

    fn trending_then_falling(n: i64, peak_at: i64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = if i <= peak_at {
                    dec!(100) + Decimal::from(i) * dec!(2)
                } else {
                    dec!(100) + Decimal::from(peak_at) * dec!(2) - Decimal::from(i - peak_at) * dec!(3)
                };
                Bar {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i),
                    open: close,
                    high: close + dec!(1),
                    low: close - dec!(1),
                    close,
                    volume: dec!(10_000),
                }
            })
            .collect()
    }

    #[test]
    fn full_run_produces_snapshots_for_every_common_date() {
        let bars = trending_then_falling(220, 150);
        let series = BarSeries::new("005930", bars).unwrap();
        let frame = IndicatorFrame::build(&series, IndicatorParams::default());
        let mut frames = BTreeMap::new();
        frames.insert("005930".to_string(), frame);

        let config = Config::default();
        let result = run(&frames, &config).unwrap();

        assert_eq!(result.snapshots.len(), 220);
        assert_eq!(result.scanned_ticker_count, 1);
        assert!(result.initial_capital == config.initial_capital);
    }

    #[test]
    fn cash_never_goes_negative_across_the_run() {
        let bars = trending_then_falling(220, 150);
        let series = BarSeries::new("005930", bars).unwrap();
        let frame = IndicatorFrame::build(&series, IndicatorParams::default());
        let mut frames = BTreeMap::new();
        frames.insert("005930".to_string(), frame);

        let config = Config::default();
        let result = run(&frames, &config).unwrap();

        for snapshot in &result.snapshots {
            assert!(snapshot.cash >= Decimal::ZERO, "cash went negative on {}", snapshot.date);
        }
    }

    #[test]
    fn empty_universe_is_rejected() {
        let frames: BTreeMap<String, IndicatorFrame> = BTreeMap::new();
        let config = Config::default();
        assert!(run(&frames, &config).is_err());
    }

    #[test]
    fn trade_ledger_is_append_only_length_matches_reported_count() {
        let bars = trending_then_falling(220, 150);
        let series = BarSeries::new("005930", bars).unwrap();
        let frame = IndicatorFrame::build(&series, IndicatorParams::default());
        let mut frames = BTreeMap::new();
        frames.insert("005930".to_string(), frame);

        let config = Config::default();
        let result = run(&frames, &config).unwrap();
        assert_eq!(result.trades.len(), result.total_trades);
    }
}
