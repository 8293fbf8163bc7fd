//! Bounded-concurrency fan-out over the ticker universe: loads bars,
//! validates them and builds the per-ticker indicator frame. Per §5, a
//! loader failure on one ticker drops that ticker from the universe with a
//! warning instead of aborting the run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::warn;

use crate::application::cache::FileCache;
use crate::application::market_data::MarketDataProvider;
use crate::domain::bar::BarSeries;
use crate::domain::errors::FatalError;
use crate::domain::frame::{IndicatorFrame, IndicatorParams};

/// Loads and computes indicator frames for every ticker in `tickers`,
/// using up to `concurrency` worker threads. Order of completion never
/// affects the result: each ticker's frame is independent and the result
/// is collected into an ordered map before the simulation begins.
///
/// When `cache` is set, a hit on the exact `(ticker, start, end)` key skips
/// `provider.load_bars` entirely; a miss falls through to the provider and
/// the freshly fetched bars are written back for next time.
pub fn load_universe(
    provider: &dyn MarketDataProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    params: IndicatorParams,
    concurrency: usize,
    cache: Option<&FileCache>,
) -> Result<BTreeMap<String, IndicatorFrame>, FatalError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()
        .expect("failed to build loader thread pool");

    let dropped = AtomicUsize::new(0);

    let frames: Vec<(String, IndicatorFrame)> = pool.install(|| {
        tickers
            .par_iter()
            .filter_map(|ticker| match load_one(provider, ticker, start, end, params, cache) {
                Ok(frame) => Some((ticker.clone(), frame)),
                Err(reason) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(ticker = %ticker, reason = %reason, "dropping ticker from universe");
                    None
                }
            })
            .collect()
    });

    if frames.is_empty() {
        return Err(FatalError::EmptyUniverse);
    }

    Ok(frames.into_iter().collect())
}

fn load_one(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    params: IndicatorParams,
    cache: Option<&FileCache>,
) -> Result<IndicatorFrame, String> {
    let bars = match cache.and_then(|c| c.get(ticker, start, end)) {
        Some(cached) => cached.bars,
        None => {
            let fetched = provider.load_bars(ticker, start, end).map_err(|e| e.to_string())?;
            if let Some(c) = cache {
                if let Err(e) = c.put(ticker, start, end, &fetched) {
                    warn!(ticker = %ticker, error = %e, "failed to write indicator cache entry");
                }
            }
            fetched
        }
    };
    let series = BarSeries::new(ticker, bars).map_err(|e| e.to_string())?;

    let min_history = params.ema_long.max(params.macd_middle.slow) + params.macd_middle.signal;
    if series.len() < min_history {
        return Err(format!(
            "insufficient history for warmup (have {}, need {})",
            series.len(),
            min_history
        ));
    }

    Ok(IndicatorFrame::build(&series, params))
}

/// Union of every frame's trading dates, sorted ascending (§4.14).
pub fn common_dates(frames: &BTreeMap<String, IndicatorFrame>) -> Vec<NaiveDate> {
    let mut dates: std::collections::BTreeSet<NaiveDate> = std::collections::BTreeSet::new();
    for frame in frames.values() {
        dates.extend(frame.dates.iter().copied());
    }
    dates.into_iter().collect()
}
