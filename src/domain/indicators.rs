//! Exponential/simple moving averages, true range/ATR, MACD, slope and peakout
//! detection. All series are index-aligned with the bar history they were
//! computed from; `None` marks "not yet warmed up", never a sentinel value.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::bar::Bar;

/// Simple moving average, `None` until `period` values have been seen.
pub fn sma(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let n = Decimal::from(period);
    for i in period.saturating_sub(1)..values.len() {
        let sum: Decimal = values[i + 1 - period..=i].iter().sum();
        out[i] = Some(sum / n);
    }
    out
}

/// Recursive EMA with an SMA-seeded warmup window, matching
/// `ewm(span=period, adjust=False, min_periods=period)`.
pub fn ema(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    ema_on_optional(&values.iter().copied().map(Some).collect::<Vec<_>>(), period)
}

/// Same recurrence as [`ema`] but operating on a series that may itself have
/// a `None` warmup prefix (used to chain EMA over an already-derived series,
/// e.g. the MACD signal line over the MACD line).
pub fn ema_on_optional(values: &[Option<Decimal>], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let first_valid = values.iter().position(|v| v.is_some());
    let Some(start) = first_valid else {
        return out;
    };
    let alpha = dec!(2) / Decimal::from(period + 1);
    let one_minus_alpha = Decimal::ONE - alpha;

    let mut i = start;
    while i < values.len() {
        if values[i].is_none() {
            i += 1;
            continue;
        }
        let warmup_end = i + period - 1;
        if warmup_end >= values.len() {
            break;
        }
        // Confirm the warmup window is contiguous and fully populated.
        if values[i..=warmup_end].iter().any(|v| v.is_none()) {
            i += 1;
            continue;
        }
        let seed_sum: Decimal = values[i..=warmup_end].iter().map(|v| v.unwrap()).sum();
        let mut prev = seed_sum / Decimal::from(period);
        out[warmup_end] = Some(prev);
        for (j, value) in values.iter().enumerate().skip(warmup_end + 1) {
            let Some(v) = value else {
                // A hole after warmup breaks the recurrence; restart seeding
                // from the next contiguous run.
                break;
            };
            prev = prev * one_minus_alpha + *v * alpha;
            out[j] = Some(prev);
        }
        break;
    }
    out
}

/// True range: `max(H-L, |H-Cprev|, |L-Cprev|)`. First bar is `None` (no
/// previous close).
pub fn true_range(bars: &[Bar]) -> Vec<Option<Decimal>> {
    let mut out = vec![None; bars.len()];
    for i in 1..bars.len() {
        let prev_close = bars[i - 1].close;
        let hl = bars[i].high - bars[i].low;
        let hc = (bars[i].high - prev_close).abs();
        let lc = (bars[i].low - prev_close).abs();
        out[i] = Some(hl.max(hc).max(lc));
    }
    out
}

/// ATR: EMA of true range with the same recurrence/warmup as [`ema`].
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<Decimal>> {
    ema_on_optional(&true_range(bars), period)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdTriplet {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Vec<Option<Decimal>>,
    pub signal: Vec<Option<Decimal>>,
    pub histogram: Vec<Option<Decimal>>,
}

pub fn macd(closes: &[Decimal], triplet: MacdTriplet) -> MacdSeries {
    let fast_ema = ema(closes, triplet.fast);
    let slow_ema = ema(closes, triplet.slow);
    let macd_line: Vec<Option<Decimal>> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(*f - *s),
            _ => None,
        })
        .collect();
    let signal_line = ema_on_optional(&macd_line, triplet.signal);
    let histogram = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(*m - *s),
            _ => None,
        })
        .collect();
    MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

/// Sign of the first difference with a hysteresis band so that a flat run
/// classifies as `Neutral` rather than flickering between `Up`/`Down`.
/// `epsilon` is an absolute threshold on the same scale as `series`; callers
/// typically derive it from a fraction of the series' trailing average
/// magnitude.
pub fn classify_direction(series: &[Option<Decimal>], epsilon: Decimal) -> Vec<Option<Direction>> {
    let mut out = vec![None; series.len()];
    for i in 1..series.len() {
        if let (Some(prev), Some(cur)) = (series[i - 1], series[i]) {
            let delta = cur - prev;
            out[i] = Some(if delta > epsilon {
                Direction::Up
            } else if delta < -epsilon {
                Direction::Down
            } else {
                Direction::Neutral
            });
        }
    }
    out
}

/// Default hysteresis epsilon: a small fraction of the trailing mean
/// absolute value of the series (zero series collapse to a tiny absolute
/// floor so direction is still well-defined).
pub fn default_epsilon(series: &[Option<Decimal>], window: usize) -> Decimal {
    let values: Vec<Decimal> = series
        .iter()
        .rev()
        .filter_map(|v| *v)
        .take(window)
        .collect();
    if values.is_empty() {
        return dec!(0.0001);
    }
    let mean_abs: Decimal =
        values.iter().map(|v| v.abs()).sum::<Decimal>() / Decimal::from(values.len());
    (mean_abs * dec!(0.05)).max(dec!(0.0001))
}

/// Zero-line cross of a MACD line: `+1` golden cross, `-1` dead cross, else 0.
pub fn zero_cross(series: &[Option<Decimal>]) -> Vec<i8> {
    let mut out = vec![0i8; series.len()];
    for i in 1..series.len() {
        if let (Some(prev), Some(cur)) = (series[i - 1], series[i]) {
            if prev < Decimal::ZERO && cur >= Decimal::ZERO {
                out[i] = 1;
            } else if prev >= Decimal::ZERO && cur < Decimal::ZERO {
                out[i] = -1;
            }
        }
    }
    out
}

/// Cross of `a` over `b`: `+1` when `a` crosses from below to at/above `b`
/// (golden cross), `-1` on the reverse (dead cross), else 0.
pub fn series_cross(a: &[Option<Decimal>], b: &[Option<Decimal>]) -> Vec<i8> {
    let mut out = vec![0i8; a.len()];
    for i in 1..a.len() {
        if let (Some(a0), Some(a1), Some(b0), Some(b1)) = (a[i - 1], a[i], b[i - 1], b[i]) {
            if a0 < b0 && a1 >= b1 {
                out[i] = 1;
            } else if a0 >= b0 && a1 < b1 {
                out[i] = -1;
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlopeLabel {
    StrongUp,
    Up,
    WeakUp,
    Flat,
    WeakDown,
    Down,
    StrongDown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlopeThresholds {
    pub strong: Decimal,
    pub normal: Decimal,
    pub weak: Decimal,
}

impl Default for SlopeThresholds {
    fn default() -> Self {
        Self {
            strong: dec!(0.003),
            normal: dec!(0.0015),
            weak: dec!(0.0005),
        }
    }
}

/// `(series_t - series_{t-period}) / period`.
pub fn slope(series: &[Option<Decimal>], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; series.len()];
    if period == 0 {
        return out;
    }
    for i in period..series.len() {
        if let (Some(prev), Some(cur)) = (series[i - period], series[i]) {
            out[i] = Some((cur - prev) / Decimal::from(period));
        }
    }
    out
}

/// Classifies a slope value normalised by price into a categorical label.
pub fn classify_slope(
    slope_value: Decimal,
    price: Decimal,
    thresholds: SlopeThresholds,
) -> SlopeLabel {
    if price <= Decimal::ZERO {
        return SlopeLabel::Flat;
    }
    let normalized = (slope_value / price).abs();
    let up = slope_value > Decimal::ZERO;
    if normalized >= thresholds.strong {
        if up { SlopeLabel::StrongUp } else { SlopeLabel::StrongDown }
    } else if normalized >= thresholds.normal {
        if up { SlopeLabel::Up } else { SlopeLabel::Down }
    } else if normalized >= thresholds.weak {
        if up { SlopeLabel::WeakUp } else { SlopeLabel::WeakDown }
    } else {
        SlopeLabel::Flat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakoutDirection {
    Down,
    Up,
}

/// True at bar `t` iff the series peaked (for `Down`: local max at `t-1`,
/// strictly lower at `t`) and is now moving away from the extreme. Robust to
/// plateaus: a flat run followed by a move away counts on the first moving bar.
pub fn detect_peakout(series: &[Option<Decimal>], direction: PeakoutDirection) -> Vec<bool> {
    let mut out = vec![false; series.len()];
    for i in 2..series.len() {
        let (Some(prev2), Some(prev1), Some(cur)) = (series[i - 2], series[i - 1], series[i])
        else {
            continue;
        };
        out[i] = match direction {
            PeakoutDirection::Down => prev1 >= prev2 && cur < prev1,
            PeakoutDirection::Up => prev1 <= prev2 && cur > prev1,
        };
    }
    out
}

/// Rolling percentile rank (0-100) of `series[i]` within the trailing
/// `window` observations (inclusive of `i`). `None` until at least 2 values
/// are available in the window.
pub fn rolling_percentile(series: &[Option<Decimal>], window: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; series.len()];
    for i in 0..series.len() {
        let Some(cur) = series[i] else { continue };
        let start = i.saturating_sub(window.saturating_sub(1));
        let sample: Vec<Decimal> = series[start..=i].iter().filter_map(|v| *v).collect();
        if sample.len() < 2 {
            continue;
        }
        let count_le = sample.iter().filter(|v| **v <= cur).count();
        let pct = Decimal::from(count_le * 100) / Decimal::from(sample.len());
        out[i] = Some(pct);
    }
    out
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
