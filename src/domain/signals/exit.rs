//! Multi-level exit signals built from the three-MACD exit chain (histogram
//! peakout -> MACD-line peakout -> MACD/signal cross) under four merge
//! strategies.

use serde::{Deserialize, Serialize};

use crate::domain::frame::{ExitChain, IndicatorFrame};
use crate::domain::trading::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitMergeStrategy {
    Sequential,
    Fastest,
    Slowest,
    Majority,
}

impl Default for ExitMergeStrategy {
    fn default() -> Self {
        ExitMergeStrategy::Sequential
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub level: u8,
    /// Close ratio in percent: 0, 50 or 100.
    pub ratio: u8,
    pub source: &'static str,
}

impl ExitSignal {
    pub fn none() -> Self {
        Self { level: 0, ratio: 0, source: "none" }
    }
}

fn level_hit(chain: &ExitChain, idx: usize, side: Side) -> (bool, bool, bool) {
    match side {
        Side::Long => (
            chain.hist_peakout_down[idx],
            chain.macd_peakout_down[idx],
            chain.macd_signal_cross[idx] == -1,
        ),
        Side::Short => (
            chain.hist_peakout_up[idx],
            chain.macd_peakout_up[idx],
            chain.macd_signal_cross[idx] == 1,
        ),
    }
}

fn ratio_for(level: u8) -> u8 {
    match level {
        1 => 0,
        2 => 50,
        3 => 100,
        _ => 0,
    }
}

/// Applies level 1 -> 2 -> 3 in increasing order so a higher level fired on
/// the same bar overrides a lower one, per the merge_sequential assignment
/// order.
fn assign_increasing(hits: [(bool, &'static str); 3]) -> ExitSignal {
    let mut signal = ExitSignal::none();
    for (level, (hit, source)) in hits.into_iter().enumerate() {
        let level = (level + 1) as u8;
        if hit {
            signal = ExitSignal { level, ratio: ratio_for(level), source };
        }
    }
    signal
}

pub fn generate_exit_signal(
    frame: &IndicatorFrame,
    idx: usize,
    side: Side,
    strategy: ExitMergeStrategy,
) -> ExitSignal {
    match strategy {
        ExitMergeStrategy::Sequential => {
            let (l1, _, _) = level_hit(&frame.exit_upper, idx, side);
            let (_, l2, _) = level_hit(&frame.exit_middle, idx, side);
            let (_, _, l3) = level_hit(&frame.exit_lower, idx, side);
            assign_increasing([(l1, "upper"), (l2, "middle"), (l3, "lower")])
        }
        ExitMergeStrategy::Fastest => {
            let (l1, l2, l3) = level_hit(&frame.exit_upper, idx, side);
            assign_increasing([(l1, "upper"), (l2, "upper"), (l3, "upper")])
        }
        ExitMergeStrategy::Slowest => {
            let (l1, l2, l3) = level_hit(&frame.exit_lower, idx, side);
            assign_increasing([(l1, "lower"), (l2, "lower"), (l3, "lower")])
        }
        ExitMergeStrategy::Majority => {
            let u = level_hit(&frame.exit_upper, idx, side);
            let m = level_hit(&frame.exit_middle, idx, side);
            let l = level_hit(&frame.exit_lower, idx, side);
            let majority = |a: bool, b: bool, c: bool| [a, b, c].into_iter().filter(|x| *x).count() >= 2;
            let l1 = majority(u.0, m.0, l.0);
            let l2 = majority(u.1, m.1, l.1);
            let l3 = majority(u.2, m.2, l.2);
            assign_increasing([(l1, "majority"), (l2, "majority"), (l3, "majority")])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_mapping_matches_spec_levels() {
        assert_eq!(ratio_for(1), 0);
        assert_eq!(ratio_for(2), 50);
        assert_eq!(ratio_for(3), 100);
    }

    #[test]
    fn higher_level_overrides_lower_on_same_bar() {
        let signal = assign_increasing([(true, "upper"), (true, "middle"), (true, "lower")]);
        assert_eq!(signal.level, 3);
        assert_eq!(signal.ratio, 100);
        assert_eq!(signal.source, "lower");
    }

    #[test]
    fn only_level_one_hit_yields_zero_ratio() {
        let signal = assign_increasing([(true, "upper"), (false, "middle"), (false, "lower")]);
        assert_eq!(signal.level, 1);
        assert_eq!(signal.ratio, 0);
    }
}
