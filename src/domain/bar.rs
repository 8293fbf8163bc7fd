use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DataError;

/// A single day's OHLCV observation for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    fn validate(&self) -> Result<(), DataError> {
        if self.open <= Decimal::ZERO
            || self.high <= Decimal::ZERO
            || self.low <= Decimal::ZERO
            || self.close <= Decimal::ZERO
        {
            return Err(DataError::InvalidBar {
                date: self.date,
                reason: "non-positive OHLC".into(),
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(DataError::InvalidBar {
                date: self.date,
                reason: "negative volume".into(),
            });
        }
        if self.high < self.low {
            return Err(DataError::InvalidBar {
                date: self.date,
                reason: "high below low".into(),
            });
        }
        Ok(())
    }
}

/// Ordered, deduplicated, validated daily bar history for one ticker.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    pub ticker: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Builds a series from an unordered bar set, sorting by date and rejecting
    /// duplicate dates or invalid OHLCV rows.
    pub fn new(ticker: impl Into<String>, mut bars: Vec<Bar>) -> Result<Self, DataError> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(DataError::EmptyFrame {
                ticker: ticker.clone(),
            });
        }
        bars.sort_by_key(|b| b.date);
        for w in bars.windows(2) {
            if w[0].date == w[1].date {
                return Err(DataError::InvalidBar {
                    date: w[1].date,
                    reason: format!("duplicate date for {ticker}"),
                });
            }
        }
        for bar in &bars {
            bar.validate()?;
        }
        Ok(Self { ticker, bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    pub fn close_at(&self, date: NaiveDate) -> Option<Decimal> {
        self.index_of(date).map(|i| self.bars[i].close)
    }
}
