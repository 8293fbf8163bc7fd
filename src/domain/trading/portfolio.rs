use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::TradingError;
use crate::domain::trading::types::{OrderSide, Position, Trade};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub equity: Decimal,
    pub open_count: usize,
}

/// Owns cash, open positions and the append-only trade/snapshot ledgers for
/// one simulation run.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: Decimal,
    pub initial_capital: Decimal,
    pub commission_rate: Decimal,
    pub open_positions: HashMap<String, Position>,
    pub closed_positions: Vec<Position>,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<Snapshot>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal, commission_rate: Decimal) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            commission_rate,
            open_positions: HashMap::new(),
            closed_positions: Vec::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn equity(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        let mut equity = self.cash;
        for (ticker, position) in &self.open_positions {
            let price = current_prices.get(ticker).copied().unwrap_or(position.entry_price);
            equity += position.value(price);
        }
        equity
    }

    /// Current unit count per ticker, for the portfolio-limit checks.
    pub fn units_by_ticker(&self) -> HashMap<String, u32> {
        self.open_positions
            .iter()
            .map(|(t, p)| (t.clone(), p.units))
            .collect()
    }

    /// Opens a new position or folds into an existing one, debiting cash by
    /// `cost` (price*shares + commission already included by the caller).
    pub fn add_position(&mut self, mut position: Position, cost: Decimal) -> Result<(), TradingError> {
        if cost > self.cash {
            return Err(TradingError::InsufficientFunds { need: cost, available: self.cash });
        }
        self.cash -= cost;
        if let Some(existing) = self.open_positions.get_mut(&position.ticker) {
            existing.add_fill(position.shares, position.entry_price, position.units);
            existing.highest_since_entry = existing.highest_since_entry.max(position.highest_since_entry);
        } else {
            position.highest_since_entry = position.entry_price;
            self.open_positions.insert(position.ticker.clone(), position);
        }
        Ok(())
    }

    /// Closes `shares_to_close` of `ticker` at `exit_price`, crediting cash by
    /// proceeds minus commission and appending a trade record. Fully closes
    /// (moving the position to the closed ledger) when the full size is
    /// requested.
    #[allow(clippy::too_many_arguments)]
    pub fn close_position(
        &mut self,
        ticker: &str,
        shares_to_close: Decimal,
        exit_price: Decimal,
        date: NaiveDate,
        reason: impl Into<String>,
        commission: Decimal,
    ) -> Result<Trade, TradingError> {
        let position = self
            .open_positions
            .get_mut(ticker)
            .ok_or_else(|| TradingError::PositionNotFound { ticker: ticker.to_string() })?;

        if shares_to_close > position.shares {
            return Err(TradingError::OverClose {
                ticker: ticker.to_string(),
                requested: shares_to_close,
                held: position.shares,
            });
        }

        let shares_before = position.shares;
        let pnl = (exit_price - position.entry_price) * shares_to_close;
        let return_pct = if position.entry_price > Decimal::ZERO {
            (exit_price - position.entry_price) / position.entry_price * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        let holding_days = (date - position.entry_date).num_days();

        let trade = Trade {
            date,
            ticker: ticker.to_string(),
            action: OrderSide::Sell,
            shares: shares_to_close,
            entry_price: position.entry_price,
            exit_price,
            pnl,
            return_pct,
            holding_days,
            reason: reason.into(),
            commission,
            entry_stage: position.stage_at_entry,
            entry_strategy: position.entry_strategy.clone(),
            signal_strength_at_entry: position.signal_strength_at_entry,
        };

        self.cash += exit_price * shares_to_close - commission;
        position.shares -= shares_to_close;

        if position.shares <= Decimal::ZERO {
            let closed = self.open_positions.remove(ticker).unwrap();
            self.closed_positions.push(closed);
        } else {
            position.scale_units_after_partial_close(shares_before);
        }

        self.trades.push(trade.clone());
        Ok(trade)
    }

    pub fn update_highest_since_entry(&mut self, current_prices: &HashMap<String, Decimal>) {
        for (ticker, position) in self.open_positions.iter_mut() {
            if let Some(&price) = current_prices.get(ticker) {
                position.highest_since_entry = position.highest_since_entry.max(price);
            }
        }
    }

    pub fn record_snapshot(&mut self, date: NaiveDate, current_prices: &HashMap<String, Decimal>) {
        let equity = self.equity(current_prices);
        self.snapshots.push(Snapshot {
            date,
            cash: self.cash,
            equity,
            open_count: self.open_positions.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::{Side, StopKind};
    use rust_decimal_macros::dec;

    fn position(ticker: &str, shares: Decimal, entry_price: Decimal) -> Position {
        Position {
            ticker: ticker.to_string(),
            side: Side::Long,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            entry_price,
            shares,
            units: 1,
            stop_price: entry_price - dec!(10),
            stop_kind: StopKind::Volatility,
            highest_since_entry: entry_price,
            signal_strength_at_entry: dec!(80),
            stage_at_entry: 6,
            entry_strategy: "normal_buy".into(),
        }
    }

    #[test]
    fn add_position_debits_cash() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(0.00015));
        portfolio.add_position(position("005930", dec!(10), dec!(100)), dec!(1000)).unwrap();
        assert_eq!(portfolio.cash, dec!(99000));
        assert_eq!(portfolio.open_positions.len(), 1);
    }

    #[test]
    fn add_position_rejects_insufficient_cash() {
        let mut portfolio = Portfolio::new(dec!(500), dec!(0.00015));
        let err = portfolio.add_position(position("005930", dec!(10), dec!(100)), dec!(1000));
        assert!(err.is_err());
    }

    #[test]
    fn full_close_moves_position_to_closed_ledger() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(0.00015));
        portfolio.add_position(position("005930", dec!(10), dec!(100)), dec!(1000)).unwrap();
        let trade = portfolio
            .close_position("005930", dec!(10), dec!(120), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), "exit_signal(lower)", dec!(2))
            .unwrap();
        assert_eq!(trade.pnl, dec!(200));
        assert!(portfolio.open_positions.is_empty());
        assert_eq!(portfolio.closed_positions.len(), 1);
    }

    #[test]
    fn partial_close_keeps_position_open_and_scales_units() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(0.00015));
        let mut pos = position("005930", dec!(10), dec!(100));
        pos.units = 4;
        portfolio.add_position(pos, dec!(1000)).unwrap();
        portfolio
            .close_position("005930", dec!(5), dec!(110), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), "exit_signal(middle)", dec!(1))
            .unwrap();
        let remaining = &portfolio.open_positions["005930"];
        assert_eq!(remaining.shares, dec!(5));
        assert_eq!(remaining.units, 2);
    }

    #[test]
    fn over_close_is_rejected() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(0.00015));
        portfolio.add_position(position("005930", dec!(10), dec!(100)), dec!(1000)).unwrap();
        let err = portfolio.close_position("005930", dec!(20), dec!(110), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), "stop_loss(volatility)", dec!(0));
        assert!(err.is_err());
    }
}
