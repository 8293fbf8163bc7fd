//! Entry-signal generation: stage + triple-MACD directional alignment.

use serde::{Deserialize, Serialize};

use crate::domain::frame::IndicatorFrame;
use crate::domain::indicators::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySignal {
    None,
    NormalBuy,
    EarlyBuy,
    NormalSell,
    EarlySell,
}

impl EntrySignal {
    /// The `-2..=2` coded value used by the original methodology.
    pub fn code(self) -> i8 {
        match self {
            EntrySignal::None => 0,
            EntrySignal::NormalBuy => 1,
            EntrySignal::EarlyBuy => 2,
            EntrySignal::NormalSell => -1,
            EntrySignal::EarlySell => -2,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, EntrySignal::NormalBuy | EntrySignal::EarlyBuy)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, EntrySignal::NormalSell | EntrySignal::EarlySell)
    }
}

fn all_directions(frame: &IndicatorFrame, idx: usize, want: Direction) -> bool {
    [
        frame.dir_upper[idx],
        frame.dir_middle[idx],
        frame.dir_lower[idx],
    ]
    .into_iter()
    .all(|d| d == Some(want))
}

/// Generates the entry signal at `idx`. Early variants (stage 5/2) only fire
/// when `enable_early` is set and the normal variant is absent, so early
/// signals never override a normal one on the same bar.
pub fn generate_entry_signal(frame: &IndicatorFrame, idx: usize, enable_early: bool) -> EntrySignal {
    let Some(stage) = frame.stage[idx] else {
        return EntrySignal::None;
    };

    if stage == 6 && all_directions(frame, idx, Direction::Up) {
        return EntrySignal::NormalBuy;
    }
    if stage == 3 && all_directions(frame, idx, Direction::Down) {
        return EntrySignal::NormalSell;
    }
    if enable_early {
        if stage == 5 && all_directions(frame, idx, Direction::Up) {
            return EntrySignal::EarlyBuy;
        }
        if stage == 2 && all_directions(frame, idx, Direction::Down) {
            return EntrySignal::EarlySell;
        }
    }
    EntrySignal::None
}

/// Label used for trade-ledger/analytics tagging (spec §3 "entry strategy
/// tag"), derived from which stage actually produced the signal.
pub fn entry_strategy_label(signal: EntrySignal) -> &'static str {
    match signal {
        EntrySignal::NormalBuy => "normal_buy",
        EntrySignal::EarlyBuy => "early_buy",
        EntrySignal::NormalSell => "contrarian_buy",
        EntrySignal::EarlySell => "early_contrarian_buy",
        EntrySignal::None => "none",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::{Bar, BarSeries};
    use crate::domain::frame::IndicatorParams;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn uptrend_frame(n: i64) -> IndicatorFrame {
        let bars = (0..n)
            .map(|i| {
                let close = dec!(100) + Decimal::from(i);
                Bar {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i),
                    open: close,
                    high: close + dec!(1),
                    low: close - dec!(1),
                    close,
                    volume: dec!(1000),
                }
            })
            .collect();
        let series = BarSeries::new("TEST", bars).unwrap();
        IndicatorFrame::build(&series, IndicatorParams::default())
    }

    #[test]
    fn no_signal_before_warmup() {
        let frame = uptrend_frame(10);
        assert_eq!(generate_entry_signal(&frame, 5, false), EntrySignal::None);
    }

    #[test]
    fn entry_strategy_label_maps_signal_kind() {
        assert_eq!(entry_strategy_label(EntrySignal::NormalBuy), "normal_buy");
        assert_eq!(entry_strategy_label(EntrySignal::EarlySell), "early_contrarian_buy");
    }
}
