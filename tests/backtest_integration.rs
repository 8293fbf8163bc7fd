//! End-to-end coverage: loads a small synthetic multi-ticker universe
//! through the public loader/engine API and checks the cross-cutting
//! invariants a unit test on a single module can't see.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rustrade_backtest::application::loader;
use rustrade_backtest::application::market_data::InMemoryMarketData;
use rustrade_backtest::application::simulation::engine;
use rustrade_backtest::config::Config;
use rustrade_backtest::domain::bar::Bar;

fn date(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
}

/// A long uptrend that peaks and reverses, long enough to clear warmup
/// (ema_long=40, macd_middle slow=40 + signal=9) and produce at least one
/// full entry/exit cycle.
fn trending_bars(n: i64, peak_at: i64, base: Decimal) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = if i <= peak_at {
                base + Decimal::from(i) * dec!(2)
            } else {
                base + Decimal::from(peak_at) * dec!(2) - Decimal::from(i - peak_at) * dec!(3)
            };
            Bar {
                date: date(i),
                open: close,
                high: close + dec!(1),
                low: close - dec!(1),
                close,
                volume: dec!(50_000),
            }
        })
        .collect()
}

fn universe(tickers: &[(&str, Decimal)]) -> InMemoryMarketData {
    let mut source = InMemoryMarketData::new();
    for (ticker, base) in tickers {
        source.insert(*ticker, trending_bars(240, 160, *base));
    }
    source
}

fn run_universe(tickers: &[String], source: &InMemoryMarketData, config: &Config) -> engine::BacktestResult {
    let frames = loader::load_universe(
        source,
        tickers,
        date(0),
        date(300),
        config.indicators,
        config.concurrency.loader_concurrency,
        None,
    )
    .expect("universe should not be empty");
    engine::run(&frames, config).expect("run should succeed")
}

#[test]
fn determinism_same_inputs_yield_identical_ledgers() {
    let tickers = vec!["005930".to_string(), "000660".to_string()];
    let source = universe(&[("005930", dec!(50_000)), ("000660", dec!(30_000))]);
    let config = Config::default();

    let first = run_universe(&tickers, &source, &config);
    let second = run_universe(&tickers, &source, &config);

    assert_eq!(first.trades.len(), second.trades.len());
    for (a, b) in first.trades.iter().zip(second.trades.iter()) {
        assert_eq!(a.ticker, b.ticker);
        assert_eq!(a.date, b.date);
        assert_eq!(a.shares, b.shares);
        assert_eq!(a.pnl, b.pnl);
        assert_eq!(a.reason, b.reason);
    }
    assert_eq!(first.snapshots.len(), second.snapshots.len());
    for (a, b) in first.snapshots.iter().zip(second.snapshots.iter()) {
        assert_eq!(a.date, b.date);
        assert_eq!(a.cash, b.cash);
        assert_eq!(a.equity, b.equity);
    }
}

#[test]
fn cash_is_never_negative_across_a_multi_ticker_run() {
    let tickers = vec!["005930".to_string(), "000660".to_string(), "035720".to_string()];
    let source = universe(&[
        ("005930", dec!(50_000)),
        ("000660", dec!(30_000)),
        ("035720", dec!(80_000)),
    ]);
    let config = Config::default();
    let result = run_universe(&tickers, &source, &config);

    for snapshot in &result.snapshots {
        assert!(snapshot.cash >= Decimal::ZERO, "cash negative on {}: {}", snapshot.date, snapshot.cash);
    }
}

#[test]
fn ledgers_only_grow_day_over_day() {
    let tickers = vec!["005930".to_string()];
    let source = universe(&[("005930", dec!(50_000))]);
    let config = Config::default();
    let result = run_universe(&tickers, &source, &config);

    assert!(result.snapshots.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn single_position_risk_never_exceeds_the_configured_cap() {
    let tickers = vec!["005930".to_string()];
    let source = universe(&[("005930", dec!(50_000))]);
    let config = Config::default();
    let result = run_universe(&tickers, &source, &config);

    let cap = config.initial_capital * config.risk.max_single_risk;
    for trade in &result.trades {
        let risk = trade.shares * (trade.entry_price - trade.exit_price).abs();
        // Entry-time risk is bounded; a trade that rode far past its stop before
        // exiting (gap risk) is expected to exceed the at-entry cap, so this
        // only checks stop-loss exits where the exit price is the stop itself.
        if trade.reason.starts_with("stop_loss") || trade.reason.starts_with("trailing_stop") {
            assert!(risk <= cap * dec!(1.01), "trade risk {risk} exceeded cap {cap}");
        }
    }
}

#[test]
fn empty_date_window_yields_an_empty_but_valid_universe_error() {
    let tickers = vec!["005930".to_string()];
    let source = universe(&[("005930", dec!(50_000))]);
    let config = Config::default();

    // A window entirely before the bars start leaves every ticker with zero
    // bars, which load_universe surfaces as a fatal empty-universe error.
    let result = loader::load_universe(
        &source,
        &tickers,
        date(-100),
        date(-50),
        config.indicators,
        config.concurrency.loader_concurrency,
        None,
    );
    assert!(result.is_err());
}
