//! CLI front-end: reads one CSV file per ticker from a data directory,
//! runs the backtest over the requested universe and date range, and prints
//! the headline summary (plus optional CSV ledgers).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;

use rustrade_backtest::application::cache::FileCache;
use rustrade_backtest::application::loader;
use rustrade_backtest::application::market_data::InMemoryMarketData;
use rustrade_backtest::application::simulation::engine;
use rustrade_backtest::config::Config;
use rustrade_backtest::domain::bar::Bar;

#[derive(Parser, Debug)]
#[command(name = "backtest", about = "Market-wide equity backtest engine")]
struct Args {
    /// Directory containing one `<TICKER>.csv` file per ticker (date,open,high,low,close,volume).
    #[arg(long)]
    data_dir: PathBuf,

    /// Inclusive simulation start date, YYYY-MM-DD.
    #[arg(long)]
    start: NaiveDate,

    /// Inclusive simulation end date, YYYY-MM-DD.
    #[arg(long)]
    end: NaiveDate,

    /// Restrict the universe to this comma-separated ticker list; defaults to every CSV in `data_dir`.
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,

    /// Optional path to write the closed-trade ledger as CSV.
    #[arg(long)]
    trades_out: Option<PathBuf>,

    /// Optional path to write the daily equity snapshot ledger as CSV.
    #[arg(long)]
    snapshots_out: Option<PathBuf>,
}

fn init_logging() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn discover_tickers(data_dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut tickers = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tickers.push(stem.to_string());
            }
        }
    }
    tickers.sort();
    Ok(tickers)
}

fn read_bars(path: &Path) -> anyhow::Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let row: CsvBar = record?;
        bars.push(Bar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

#[derive(serde::Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = Config::from_env()?;

    let tickers = match args.tickers {
        Some(list) => list,
        None => discover_tickers(&args.data_dir)?,
    };
    if tickers.is_empty() {
        anyhow::bail!("no CSV files found under {}", args.data_dir.display());
    }

    let mut market_data = InMemoryMarketData::new();
    for ticker in &tickers {
        let path = args.data_dir.join(format!("{ticker}.csv"));
        let bars = read_bars(&path).map_err(|e| anyhow::anyhow!("{ticker}: {e}"))?;
        market_data.insert(ticker.clone(), bars);
    }

    let file_cache = match (config.execution.use_cache, &config.cache_dir) {
        (true, Some(dir)) => Some(FileCache::new(dir.clone())),
        _ => None,
    };

    let frames: BTreeMap<_, _> = loader::load_universe(
        &market_data,
        &tickers,
        args.start,
        args.end,
        config.indicators,
        config.concurrency.loader_concurrency,
        file_cache.as_ref(),
    )?;

    let result = engine::run(&frames, &config)?;
    println!("{}", result.summary());

    if let Some(path) = args.trades_out {
        write_csv(&path, &result.trades)?;
    }
    if let Some(path) = args.snapshots_out {
        write_csv(&path, &result.snapshots)?;
    }

    Ok(())
}
