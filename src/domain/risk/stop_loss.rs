//! Volatility/trend stop computation, selection, trigger check and trailing
//! update.

use rust_decimal::Decimal;

use crate::domain::trading::types::{Side, StopKind};

pub fn volatility_stop(entry_price: Decimal, atr: Decimal, side: Side, atr_multiplier: Decimal) -> Decimal {
    match side {
        Side::Long => (entry_price - atr * atr_multiplier).max(Decimal::ZERO),
        Side::Short => entry_price + atr * atr_multiplier,
    }
}

fn trend_stop_is_valid(trend_stop: Decimal, entry_price: Decimal, side: Side) -> bool {
    match side {
        Side::Long => trend_stop < entry_price,
        Side::Short => trend_stop > entry_price,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StopLossResult {
    pub stop_price: Decimal,
    pub stop_kind: StopKind,
    pub volatility_stop: Decimal,
    pub trend_stop: Option<Decimal>,
}

/// Selects the stop nearer to current price: for a long position the higher
/// of volatility/trend stop; for a short, the lower. A trend stop on the
/// wrong side of entry is discarded and the volatility stop is used alone.
pub fn get_stop_loss_price(
    entry_price: Decimal,
    atr: Decimal,
    trend_stop: Option<Decimal>,
    side: Side,
    atr_multiplier: Decimal,
) -> StopLossResult {
    let vol_stop = volatility_stop(entry_price, atr, side, atr_multiplier);

    let valid_trend = trend_stop.filter(|ts| trend_stop_is_valid(*ts, entry_price, side));

    let (stop_price, stop_kind) = match valid_trend {
        None => (vol_stop, StopKind::Volatility),
        Some(ts) => match side {
            Side::Long => {
                if ts > vol_stop {
                    (ts, StopKind::Trend)
                } else {
                    (vol_stop, StopKind::Volatility)
                }
            }
            Side::Short => {
                if ts < vol_stop {
                    (ts, StopKind::Trend)
                } else {
                    (vol_stop, StopKind::Volatility)
                }
            }
        },
    };

    StopLossResult {
        stop_price,
        stop_kind,
        volatility_stop: vol_stop,
        trend_stop: valid_trend,
    }
}

/// Long triggers when `current <= stop` (inclusive); short when `current >= stop`.
pub fn check_stop_loss_triggered(current_price: Decimal, stop_price: Decimal, side: Side) -> bool {
    match side {
        Side::Long => current_price <= stop_price,
        Side::Short => current_price >= stop_price,
    }
}

/// Long: `max(current_stop, highest - atr*mult, entry)` — never trails below
/// entry, regardless of how the volatility-based candidate sits. Short
/// mirrors this using the running low.
pub fn update_trailing_stop(
    entry_price: Decimal,
    extreme_since_entry: Decimal,
    current_stop: Decimal,
    atr: Decimal,
    side: Side,
    atr_multiplier: Decimal,
) -> Decimal {
    match side {
        Side::Long => current_stop.max(extreme_since_entry - atr * atr_multiplier).max(entry_price),
        Side::Short => current_stop.min(extreme_since_entry + atr * atr_multiplier).min(entry_price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trend_stop_wins_when_nearer_for_long() {
        let result = get_stop_loss_price(dec!(50_000), dec!(1_000), Some(dec!(49_000)), Side::Long, dec!(2));
        assert_eq!(result.stop_price, dec!(49_000));
        assert_eq!(result.stop_kind, StopKind::Trend);
    }

    #[test]
    fn volatility_stop_wins_when_trend_stop_is_further_for_long() {
        let result = get_stop_loss_price(dec!(50_000), dec!(1_000), Some(dec!(47_000)), Side::Long, dec!(2));
        assert_eq!(result.stop_price, dec!(48_000));
        assert_eq!(result.stop_kind, StopKind::Volatility);
    }

    #[test]
    fn invalid_trend_stop_falls_back_to_volatility() {
        let result = get_stop_loss_price(dec!(50_000), dec!(1_000), Some(dec!(51_000)), Side::Long, dec!(2));
        assert_eq!(result.stop_kind, StopKind::Volatility);
    }

    #[test]
    fn trigger_check_is_inclusive_for_long() {
        assert!(check_stop_loss_triggered(dec!(47_000), dec!(48_000), Side::Long));
        assert!(check_stop_loss_triggered(dec!(48_000), dec!(48_000), Side::Long));
        assert!(!check_stop_loss_triggered(dec!(49_000), dec!(48_000), Side::Long));
    }

    #[test]
    fn trailing_stop_never_decreases_for_long() {
        let s1 = update_trailing_stop(dec!(100), dec!(110), dec!(90), dec!(5), Side::Long, dec!(2));
        assert_eq!(s1, dec!(100)); // 110-10=100, above entry, fine
        let s2 = update_trailing_stop(dec!(100), dec!(105), s1, dec!(5), Side::Long, dec!(2));
        assert!(s2 >= s1);
    }

    #[test]
    fn trailing_stop_floors_at_entry_even_while_below_it_for_long() {
        // Volatility stop starts at entry-10=90; highest hasn't risen enough
        // yet (95-10=85) to carry the trailing candidate past entry, but the
        // stop must never sit below entry regardless.
        let s = update_trailing_stop(dec!(100), dec!(95), dec!(90), dec!(5), Side::Long, dec!(2));
        assert_eq!(s, dec!(100));
    }
}
