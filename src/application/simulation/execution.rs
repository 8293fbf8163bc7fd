//! Slippage-adjusted fills and commission (§4.12). Market orders only; a
//! limit-order variant is modeled for completeness but the driver never
//! issues one.

use rust_decimal::Decimal;

use crate::domain::trading::types::OrderSide;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionConfig {
    pub slippage_pct: Decimal,
    pub commission_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    /// Accepted by the type but never emitted by the simulation driver.
    Limit,
}

#[derive(Debug, Clone, Copy)]
pub struct Fill {
    pub fill_price: Decimal,
    pub commission: Decimal,
    /// Negative for a buy (cash out), positive for a sell (cash in).
    pub cash_delta: Decimal,
}

/// Applies slippage in the adverse direction (buy pays more, sell receives
/// less), then commission on the filled notional.
pub fn execute_market_order(market_price: Decimal, shares: Decimal, side: OrderSide, config: ExecutionConfig) -> Fill {
    let fill_price = match side {
        OrderSide::Buy => market_price * (Decimal::ONE + config.slippage_pct),
        OrderSide::Sell => market_price * (Decimal::ONE - config.slippage_pct),
    };
    let commission = fill_price * shares * config.commission_rate;
    let notional = fill_price * shares;
    let cash_delta = match side {
        OrderSide::Buy => -(notional + commission),
        OrderSide::Sell => notional - commission,
    };
    Fill { fill_price, commission, cash_delta }
}
