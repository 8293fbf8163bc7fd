//! Six-way moving-average arrangement combined with triple-MACD zero-line
//! crosses into a single regime label (1-6).

use rust_decimal::Decimal;

/// Arrangement-only stage from the relative order of
/// `(ema_short, ema_mid, ema_long)`. `None` until all three have warmed up.
pub fn arrangement_stage(
    ema_short: Option<Decimal>,
    ema_mid: Option<Decimal>,
    ema_long: Option<Decimal>,
) -> Option<u8> {
    let (s, m, l) = (ema_short?, ema_mid?, ema_long?);
    Some(if s > m && m > l {
        1
    } else if m > s && s > l {
        2
    } else if m > l && l > s {
        3
    } else if l > m && m > s {
        4
    } else if l > s && s > m {
        5
    } else if s > l && l > m {
        6
    } else {
        // Ties between adjacent EMAs: hold the previous arrangement by
        // returning the "no distinct order" case; callers keep prior stage.
        0
    })
}

/// Applies the MACD zero-line-cross overrides in priority order
/// lower -> middle -> upper, so the upper-MACD cross (applied last) wins
/// when multiple crosses land on the same bar.
///
/// `cross_*` values are `+1` golden cross, `-1` dead cross, `0` no cross.
pub fn apply_cross_overrides(base: Option<u8>, cross_lower: i8, cross_middle: i8, cross_upper: i8) -> Option<u8> {
    let mut stage = base;
    if cross_lower == 1 {
        stage = Some(1);
    } else if cross_lower == -1 {
        stage = Some(4);
    }
    if cross_middle == -1 {
        stage = Some(3);
    } else if cross_middle == 1 {
        stage = Some(6);
    }
    if cross_upper == -1 {
        stage = Some(2);
    } else if cross_upper == 1 {
        stage = Some(5);
    }
    stage
}

/// Computes the stage series for an entire frame, carrying the previous
/// valid stage forward through arrangement ties (arrangement code `0`).
pub fn compute_stage_series(
    ema_short: &[Option<Decimal>],
    ema_mid: &[Option<Decimal>],
    ema_long: &[Option<Decimal>],
    cross_lower: &[i8],
    cross_middle: &[i8],
    cross_upper: &[i8],
) -> Vec<Option<u8>> {
    let n = ema_short.len();
    let mut out = vec![None; n];
    let mut prev_stage: Option<u8> = None;
    for i in 0..n {
        let arrangement = arrangement_stage(ema_short[i], ema_mid[i], ema_long[i]);
        let base = match arrangement {
            Some(0) => prev_stage,
            other => other,
        };
        let stage = apply_cross_overrides(base, cross_lower[i], cross_middle[i], cross_upper[i]);
        out[i] = stage;
        if stage.is_some() {
            prev_stage = stage;
        }
    }
    out
}

/// Transition code `10*prev + curr` on the bar the stage changes, else `0`.
pub fn transition_codes(stages: &[Option<u8>]) -> Vec<u8> {
    let mut out = vec![0u8; stages.len()];
    for i in 1..stages.len() {
        if let (Some(prev), Some(cur)) = (stages[i - 1], stages[i]) {
            if prev != cur {
                out[i] = 10 * prev + cur;
            }
        }
    }
    out
}
