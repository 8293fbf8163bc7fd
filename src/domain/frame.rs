//! Assembles a ticker's bar history into the full indicator frame consumed
//! by signal generation, risk sizing and the simulation driver.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bar::BarSeries;
use crate::domain::indicators::{
    self, Direction, MacdSeries, MacdTriplet, PeakoutDirection, SlopeLabel, SlopeThresholds,
};
use crate::domain::stage;

/// Per-MACD exit-chain series: histogram peakout (level 1), MACD-line
/// peakout (level 2) and MACD/signal cross (level 3), each tracked for both
/// a long exit (downward exhaustion) and a short exit (upward exhaustion).
#[derive(Debug, Clone)]
pub struct ExitChain {
    pub hist_peakout_down: Vec<bool>,
    pub hist_peakout_up: Vec<bool>,
    pub macd_peakout_down: Vec<bool>,
    pub macd_peakout_up: Vec<bool>,
    pub macd_signal_cross: Vec<i8>,
}

impl ExitChain {
    fn build(macd: &MacdSeries) -> Self {
        Self {
            hist_peakout_down: indicators::detect_peakout(&macd.histogram, PeakoutDirection::Down),
            hist_peakout_up: indicators::detect_peakout(&macd.histogram, PeakoutDirection::Up),
            macd_peakout_down: indicators::detect_peakout(&macd.macd, PeakoutDirection::Down),
            macd_peakout_up: indicators::detect_peakout(&macd.macd, PeakoutDirection::Up),
            macd_signal_cross: indicators::series_cross(&macd.macd, &macd.signal),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub ema_short: usize,
    pub ema_mid: usize,
    pub ema_long: usize,
    pub atr_period: usize,
    pub atr_percentile_window: usize,
    pub macd_upper: MacdTriplet,
    pub macd_middle: MacdTriplet,
    pub macd_lower: MacdTriplet,
    pub slope_period: usize,
    pub slope_thresholds: SlopeThresholds,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_short: 5,
            ema_mid: 20,
            ema_long: 40,
            atr_period: 20,
            atr_percentile_window: 252,
            macd_upper: MacdTriplet { fast: 5, slow: 20, signal: 9 },
            macd_middle: MacdTriplet { fast: 5, slow: 40, signal: 9 },
            macd_lower: MacdTriplet { fast: 20, slow: 40, signal: 9 },
            slope_period: 5,
            slope_thresholds: SlopeThresholds::default(),
        }
    }
}

/// All derived series for one ticker, index-aligned with `dates`.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<Decimal>,
    pub ema_short: Vec<Option<Decimal>>,
    pub ema_mid: Vec<Option<Decimal>>,
    pub ema_long: Vec<Option<Decimal>>,
    pub atr: Vec<Option<Decimal>>,
    pub atr_percentile: Vec<Option<Decimal>>,
    pub macd_upper: MacdSeries,
    pub macd_middle: MacdSeries,
    pub macd_lower: MacdSeries,
    pub dir_upper: Vec<Option<Direction>>,
    pub dir_middle: Vec<Option<Direction>>,
    pub dir_lower: Vec<Option<Direction>>,
    pub stage: Vec<Option<u8>>,
    pub stage_transition: Vec<u8>,
    pub slope_long: Vec<Option<Decimal>>,
    pub slope_label: Vec<Option<SlopeLabel>>,
    pub exit_upper: ExitChain,
    pub exit_middle: ExitChain,
    pub exit_lower: ExitChain,
}

impl IndicatorFrame {
    pub fn build(series: &BarSeries, params: IndicatorParams) -> Self {
        let bars = series.bars();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let close: Vec<Decimal> = bars.iter().map(|b| b.close).collect();

        let ema_short = indicators::ema(&close, params.ema_short);
        let ema_mid = indicators::ema(&close, params.ema_mid);
        let ema_long = indicators::ema(&close, params.ema_long);

        let atr = indicators::atr(bars, params.atr_period);
        let atr_percentile = indicators::rolling_percentile(&atr, params.atr_percentile_window);

        let macd_upper = indicators::macd(&close, params.macd_upper);
        let macd_middle = indicators::macd(&close, params.macd_middle);
        let macd_lower = indicators::macd(&close, params.macd_lower);

        let eps_upper = indicators::default_epsilon(&macd_upper.macd, 60);
        let eps_middle = indicators::default_epsilon(&macd_middle.macd, 60);
        let eps_lower = indicators::default_epsilon(&macd_lower.macd, 60);
        let dir_upper = indicators::classify_direction(&macd_upper.macd, eps_upper);
        let dir_middle = indicators::classify_direction(&macd_middle.macd, eps_middle);
        let dir_lower = indicators::classify_direction(&macd_lower.macd, eps_lower);

        let cross_upper = indicators::zero_cross(&macd_upper.macd);
        let cross_middle = indicators::zero_cross(&macd_middle.macd);
        let cross_lower = indicators::zero_cross(&macd_lower.macd);

        let stage = stage::compute_stage_series(
            &ema_short,
            &ema_mid,
            &ema_long,
            &cross_lower,
            &cross_middle,
            &cross_upper,
        );
        let stage_transition = stage::transition_codes(&stage);

        let slope_long = indicators::slope(&ema_long, params.slope_period);
        let slope_label = slope_long
            .iter()
            .zip(close.iter())
            .map(|(s, c)| s.map(|s| indicators::classify_slope(s, *c, params.slope_thresholds)))
            .collect();

        let exit_upper = ExitChain::build(&macd_upper);
        let exit_middle = ExitChain::build(&macd_middle);
        let exit_lower = ExitChain::build(&macd_lower);

        Self {
            ticker: series.ticker.clone(),
            dates,
            close,
            ema_short,
            ema_mid,
            ema_long,
            atr,
            atr_percentile,
            macd_upper,
            macd_middle,
            macd_lower,
            dir_upper,
            dir_middle,
            dir_lower,
            stage,
            stage_transition,
            slope_long,
            slope_label,
            exit_upper,
            exit_middle,
            exit_lower,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use rust_decimal_macros::dec;

    fn synthetic_uptrend(n: i64) -> BarSeries {
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
        BarSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn builds_full_length_frame() {
        let series = synthetic_uptrend(120);
        let frame = IndicatorFrame::build(&series, IndicatorParams::default());
        assert_eq!(frame.len(), 120);
        assert!(frame.stage[119].is_some());
    }

    #[test]
    fn perfect_uptrend_settles_into_stage_one() {
        let series = synthetic_uptrend(150);
        let frame = IndicatorFrame::build(&series, IndicatorParams::default());
        // Far enough past warmup, short > mid > long EMAs on a monotone uptrend.
        assert_eq!(frame.stage[149], Some(1));
    }
}
