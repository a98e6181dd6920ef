//! Database maintenance and the crossover backtest over stored history.

use crate::domain::backtest::{BacktestResult, run_crossover};
use crate::domain::error::YenesisError;
use crate::domain::snapshot::indicator_rows;
use crate::domain::universe::format_market_cap;
use crate::jobs::pause;
use crate::ports::market_data_port::{HistoryRange, Interval, MarketDataPort, TickerProfile};
use crate::ports::storage_port::{DbStats, StoragePort, TickerInfo};
use chrono::{Duration, NaiveDate};
use std::time::Duration as StdDuration;

pub const DEFAULT_UPDATE_DAYS: u32 = 30;
pub const DEFAULT_KEEP_DAYS: u32 = 365;
/// Extra calendar days fetched so EMA200 is warmed up at the window start.
pub const WARMUP_DAYS: u32 = 300;

fn ticker_info(symbol: &str, profile: TickerProfile) -> TickerInfo {
    TickerInfo {
        symbol: symbol.to_string(),
        name: profile.name.unwrap_or_else(|| symbol.to_string()),
        sector: profile.sector,
        industry: profile.industry,
        market_cap: profile.market_cap.unwrap_or(0.0),
    }
}

fn update_symbol(
    storage: &dyn StoragePort,
    market_data: &dyn MarketDataPort,
    symbol: &str,
    days: u32,
    today: NaiveDate,
) -> Result<(usize, usize), YenesisError> {
    let info = match market_data.fetch_profile(symbol) {
        Ok(profile) => ticker_info(symbol, profile),
        Err(e) => {
            tracing::warn!("Profile unavailable for {}, storing symbol only: {}", symbol, e);
            TickerInfo::symbol_only(symbol)
        }
    };
    let ticker_id = storage.upsert_ticker(&info)?;

    let bars = market_data.fetch_history(symbol, HistoryRange::Days(days + WARMUP_DAYS), Interval::Daily)?;
    let rows = indicator_rows(&bars);
    let cutoff = today - Duration::days(days as i64);

    let window_start = bars.partition_point(|b| b.date < cutoff);
    let prices = storage.store_prices(ticker_id, &bars[window_start..])?;
    let indicators = storage.store_indicators(ticker_id, &rows[window_start..])?;
    Ok((prices, indicators))
}

/// Refresh the last `days` of prices and indicators for every symbol.
/// Returns (succeeded, failed).
pub fn update_database(
    storage: &dyn StoragePort,
    market_data: &dyn MarketDataPort,
    symbols: &[String],
    days: u32,
    delay: StdDuration,
    today: NaiveDate,
) -> (usize, usize) {
    let (mut success, mut failed) = (0, 0);
    for (i, symbol) in symbols.iter().enumerate() {
        pause(delay);
        match update_symbol(storage, market_data, symbol, days, today) {
            Ok((prices, indicators)) => {
                tracing::info!(
                    "[{}/{}] {}: {} prices, {} indicator rows",
                    i + 1,
                    symbols.len(),
                    symbol,
                    prices,
                    indicators
                );
                success += 1;
            }
            Err(e) => {
                tracing::error!("[{}/{}] {} failed: {}", i + 1, symbols.len(), symbol, e);
                failed += 1;
            }
        }
    }
    tracing::info!("Database update complete: {} succeeded, {} failed", success, failed);
    (success, failed)
}

pub fn format_stats(stats: &DbStats) -> String {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "Tickers: {}\nPrice rows: {}\nIndicator rows: {}\nDate range: {} to {}\n",
        stats.tickers,
        stats.prices,
        stats.indicators,
        date(stats.first_date),
        date(stats.last_date)
    );
    if !stats.largest.is_empty() {
        out.push_str("\nLargest by market cap:\n");
        for (symbol, name, cap) in &stats.largest {
            out.push_str(&format!("  {:<10} {:<40} {}\n", symbol, name, format_market_cap(*cap)));
        }
    }
    out
}

/// Crossover backtest on stored rows in `[start, end]`.
pub fn run_backtest(
    storage: &dyn StoragePort,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestResult, YenesisError> {
    let rows = storage.fetch_history(symbol, start, end)?;
    run_crossover(symbol, &rows).ok_or_else(|| YenesisError::NoData {
        symbol: symbol.to_string(),
    })
}

pub fn format_backtest(result: &BacktestResult) -> String {
    format!(
        "Backtest {} ({} to {})\n\
         Strategy return:   {:>8.2}%\n\
         Buy & hold return: {:>8.2}%\n\
         Outperformance:    {:>8.2}%\n\
         Max drawdown:      {:>8.2}%\n\
         Trades:            {:>8}\n",
        result.symbol,
        result.start_date,
        result.end_date,
        result.total_return * 100.0,
        result.buy_hold_return * 100.0,
        result.outperformance * 100.0,
        result.max_drawdown * 100.0,
        result.trades
    )
}
