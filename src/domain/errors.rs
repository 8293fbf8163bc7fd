use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while ingesting or validating a ticker's bar history.
///
/// These are recoverable at the loader level: the offending ticker is dropped
/// from the universe and the run continues.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{ticker}: no bars available")]
    EmptyFrame { ticker: String },

    #[error("invalid bar on {date}: {reason}")]
    InvalidBar { date: NaiveDate, reason: String },

    #[error("failed to load {ticker}: {reason}")]
    LoadFailed { ticker: String, reason: String },

    #[error("{ticker}: insufficient history for warmup (have {have}, need {need})")]
    InsufficientHistory {
        ticker: String,
        have: usize,
        need: usize,
    },
}

/// Errors related to order execution and portfolio bookkeeping.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("insufficient cash: need {need}, available {available}")]
    InsufficientFunds { need: Decimal, available: Decimal },

    #[error("position not found: {ticker}")]
    PositionNotFound { ticker: String },

    #[error("invalid order for {ticker}: {reason}")]
    InvalidOrder { ticker: String, reason: String },

    #[error("close request for {ticker} exceeds open shares: requested {requested}, held {held}")]
    OverClose {
        ticker: String,
        requested: Decimal,
        held: Decimal,
    },
}

/// Conditions that abort a run outright rather than being logged and skipped.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(Decimal),

    #[error("commission rate must be non-negative, got {0}")]
    NegativeCommission(Decimal),

    #[error("slippage must be non-negative, got {0}")]
    NegativeSlippage(Decimal),

    #[error("no ticker produced any usable data")]
    EmptyUniverse,
}

/// Input-validation failures for the risk-management calculators. These
/// signal a programming/config error, not a market condition.
#[derive(Debug, Error)]
pub enum RiskInputError {
    #[error("account balance must be positive, got {0}")]
    NonPositiveBalance(Decimal),

    #[error("ATR must be positive, got {0}")]
    NonPositiveAtr(Decimal),

    #[error("risk percentage must be in (0, 1], got {0}")]
    InvalidRiskPercentage(Decimal),

    #[error("stop price {stop} is on the wrong side of entry {entry} for a {side:?} position")]
    InvalidStop {
        entry: Decimal,
        stop: Decimal,
        side: crate::domain::trading::types::Side,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trading_error_formats_with_context() {
        let err = TradingError::InsufficientFunds {
            need: dec!(1000),
            available: dec!(500),
        };
        let msg = err.to_string();
        assert!(msg.contains("1000"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn fatal_error_messages_are_descriptive() {
        assert!(FatalError::NonPositiveCapital(dec!(0)).to_string().contains("positive"));
        assert!(FatalError::EmptyUniverse.to_string().contains("no ticker"));
    }
}
