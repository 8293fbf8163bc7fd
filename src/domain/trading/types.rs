use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Volatility,
    Trend,
}

/// An open long position. Re-entries on the same ticker accumulate units and
/// recompute the volume-weighted average entry price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub side: Side,
    pub entry_date: NaiveDate,
    pub entry_price: Decimal,
    pub shares: Decimal,
    pub units: u32,
    pub stop_price: Decimal,
    pub stop_kind: StopKind,
    pub highest_since_entry: Decimal,
    pub signal_strength_at_entry: Decimal,
    pub stage_at_entry: u8,
    pub entry_strategy: String,
}

impl Position {
    pub fn value(&self, current_price: Decimal) -> Decimal {
        self.shares * current_price
    }

    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        (current_price - self.entry_price) * self.shares
    }

    /// Folds an additional fill into this position, recomputing the average
    /// entry price and accumulating units.
    pub fn add_fill(&mut self, shares: Decimal, price: Decimal, units: u32) {
        let total_cost = self.entry_price * self.shares + price * shares;
        self.shares += shares;
        self.units += units;
        if self.shares > Decimal::ZERO {
            self.entry_price = total_cost / self.shares;
        }
    }

    /// Scales units down proportionally to a partial close, flooring to a
    /// whole unit.
    pub fn scale_units_after_partial_close(&mut self, shares_before: Decimal) {
        if shares_before > Decimal::ZERO {
            let ratio = self.shares / shares_before;
            let scaled = (Decimal::from(self.units) * ratio).floor();
            self.units = rust_decimal::prelude::ToPrimitive::to_u32(&scaled).unwrap_or(0).max(1);
        }
    }
}

/// A closed (fully or partially) trade on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub ticker: String,
    pub action: OrderSide,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub return_pct: Decimal,
    pub holding_days: i64,
    pub reason: String,
    pub commission: Decimal,
    pub entry_stage: u8,
    pub entry_strategy: String,
    pub signal_strength_at_entry: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_position() -> Position {
        Position {
            ticker: "005930".into(),
            side: Side::Long,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            entry_price: dec!(100),
            shares: dec!(10),
            units: 1,
            stop_price: dec!(90),
            stop_kind: StopKind::Volatility,
            highest_since_entry: dec!(100),
            signal_strength_at_entry: dec!(80),
            stage_at_entry: 6,
            entry_strategy: "normal_buy".into(),
        }
    }

    #[test]
    fn add_fill_recomputes_volume_weighted_average() {
        let mut position = base_position();
        position.add_fill(dec!(10), dec!(120), 1);
        assert_eq!(position.shares, dec!(20));
        assert_eq!(position.entry_price, dec!(110));
        assert_eq!(position.units, 2);
    }

    #[test]
    fn partial_close_scales_units_by_remaining_ratio() {
        let mut position = base_position();
        position.units = 4;
        position.shares = dec!(5); // half of original 10 remain
        position.scale_units_after_partial_close(dec!(10));
        assert_eq!(position.units, 2);
    }
}
