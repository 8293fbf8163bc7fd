//! Signal-strength scoring: MACD alignment (0-30) + trend strength (0-40) +
//! momentum (0-30), clipped to [0, 100].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::frame::IndicatorFrame;
use crate::domain::indicators::{Direction, SlopeLabel};

fn macd_alignment_score(frame: &IndicatorFrame, idx: usize) -> Decimal {
    let dirs = [frame.dir_upper[idx], frame.dir_middle[idx], frame.dir_lower[idx]];
    let up_count = dirs.iter().filter(|d| **d == Some(Direction::Up)).count();
    let down_count = dirs.iter().filter(|d| **d == Some(Direction::Down)).count();

    if up_count == 3 || down_count == 3 {
        dec!(30)
    } else if up_count == 2 || down_count == 2 {
        dec!(20)
    } else if up_count == 1 || down_count == 1 {
        dec!(10)
    } else {
        Decimal::ZERO
    }
}

fn arrangement_score(stage: Option<u8>) -> Decimal {
    match stage {
        Some(6) | Some(3) => dec!(20),
        Some(5) | Some(2) => dec!(15),
        Some(1) | Some(4) => dec!(5),
        _ => Decimal::ZERO,
    }
}

fn spread_score(frame: &IndicatorFrame, idx: usize) -> Decimal {
    let (Some(s), Some(m), Some(l), close) = (
        frame.ema_short[idx],
        frame.ema_mid[idx],
        frame.ema_long[idx],
        frame.close[idx],
    ) else {
        return dec!(5);
    };
    if close <= Decimal::ZERO {
        return dec!(5);
    }
    let total_spread = ((s - m).abs() + (m - l).abs()) / close * dec!(100);

    // Empirical percentile of total_spread against its own trailing history.
    let window = 252usize.min(idx + 1);
    let start = idx + 1 - window;
    let mut history: Vec<Decimal> = Vec::with_capacity(window);
    for i in start..=idx {
        if let (Some(s), Some(m), Some(l)) = (frame.ema_short[i], frame.ema_mid[i], frame.ema_long[i]) {
            if frame.close[i] > Decimal::ZERO {
                history.push(((s - m).abs() + (m - l).abs()) / frame.close[i] * dec!(100));
            }
        }
    }
    if history.len() < 2 {
        return dec!(5);
    }
    let count_le = history.iter().filter(|v| **v <= total_spread).count();
    let pct = Decimal::from(count_le * 100) / Decimal::from(history.len());

    if pct >= dec!(80) {
        dec!(20)
    } else if pct >= dec!(60) {
        dec!(15)
    } else if pct >= dec!(40) {
        dec!(10)
    } else {
        dec!(5)
    }
}

fn slope_score(label: Option<SlopeLabel>) -> Decimal {
    match label {
        Some(SlopeLabel::StrongUp) | Some(SlopeLabel::StrongDown) => dec!(20),
        Some(SlopeLabel::Up) | Some(SlopeLabel::Down) => dec!(15),
        Some(SlopeLabel::WeakUp) | Some(SlopeLabel::WeakDown) => dec!(10),
        _ => Decimal::ZERO,
    }
}

fn volatility_score(atr_percentile: Option<Decimal>) -> Decimal {
    let Some(pct) = atr_percentile else { return dec!(3) };
    if pct >= dec!(40) && pct <= dec!(70) {
        dec!(10)
    } else if (pct >= dec!(20) && pct < dec!(40)) || (pct > dec!(70) && pct <= dec!(85)) {
        dec!(7)
    } else {
        dec!(3)
    }
}

/// Total signal strength at `idx`, clipped to `[0, 100]`.
pub fn signal_strength(frame: &IndicatorFrame, idx: usize) -> Decimal {
    let macd_score = macd_alignment_score(frame, idx);
    let trend_score = arrangement_score(frame.stage[idx]) + spread_score(frame, idx);
    let momentum_score = slope_score(frame.slope_label[idx]) + volatility_score(frame.atr_percentile[idx]);

    (macd_score + trend_score + momentum_score).clamp(Decimal::ZERO, dec!(100))
}
