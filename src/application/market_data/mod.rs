//! Narrow collaborator interfaces for raw OHLCV data and ticker lists
//! (spec §6 "out of scope" collaborators), plus an in-memory adapter used
//! by the CLI and by tests.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::errors::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Kospi,
    Kosdaq,
    All,
}

/// Loads a single ticker's daily bar history for `[start, end]`. Failures
/// are handled by the loader: the ticker is dropped from the universe.
pub trait MarketDataProvider: Send + Sync {
    fn load_bars(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError>;
}

/// Resolves the universe of tickers to scan for a given market segment.
pub trait TickerListProvider: Send + Sync {
    fn list_tickers(&self, market: Market) -> Vec<String>;
}

/// An in-memory provider backing the CLI's file-based front-end and unit
/// tests: every ticker's full bar history is held in a map and sliced to
/// the requested window.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketData {
    bars: std::collections::HashMap<String, Vec<Bar>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(ticker.into(), bars);
    }
}

impl MarketDataProvider for InMemoryMarketData {
    fn load_bars(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let bars = self.bars.get(ticker).ok_or_else(|| DataError::LoadFailed {
            ticker: ticker.to_string(),
            reason: "ticker not present in market data source".to_string(),
        })?;
        let sliced: Vec<Bar> = bars.iter().filter(|b| b.date >= start && b.date <= end).copied().collect();
        if sliced.is_empty() {
            return Err(DataError::EmptyFrame { ticker: ticker.to_string() });
        }
        Ok(sliced)
    }
}

impl TickerListProvider for InMemoryMarketData {
    fn list_tickers(&self, _market: Market) -> Vec<String> {
        let mut tickers: Vec<String> = self.bars.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use rust_decimal_macros::dec;

    fn bar(y: i32, m: u32, d: u32) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100),
            volume: dec!(1000),
        }
    }

    #[test]
    fn missing_ticker_is_a_load_error() {
        let source = InMemoryMarketData::new();
        let err = source.load_bars("005930", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn slices_to_requested_window() {
        let mut source = InMemoryMarketData::new();
        source.insert("005930", vec![bar(2024, 1, 1), bar(2024, 2, 1), bar(2024, 3, 1)]);
        let sliced = source
            .load_bars("005930", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), NaiveDate::from_ymd_opt(2024, 2, 15).unwrap())
            .unwrap();
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn list_tickers_is_sorted() {
        let mut source = InMemoryMarketData::new();
        source.insert("000660", vec![bar(2024, 1, 1)]);
        source.insert("005930", vec![bar(2024, 1, 1)]);
        assert_eq!(source.list_tickers(Market::All), vec!["000660", "005930"]);
    }
}
