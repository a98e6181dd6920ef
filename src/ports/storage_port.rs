//! Relational store for tickers, daily prices and daily indicators.

use crate::domain::error::YenesisError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::snapshot::IndicatorRow;
use chrono::NaiveDate;

/// Rows per upsert transaction.
pub const BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerInfo {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: f64,
}

impl TickerInfo {
    /// Placeholder used when the profile lookup fails.
    pub fn symbol_only(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            sector: None,
            industry: None,
            market_cap: 0.0,
        }
    }
}

/// A stored price bar left-joined with the indicators of the same day.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub bar: OhlcvBar,
    pub indicators: IndicatorRow,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbStats {
    pub tickers: i64,
    pub prices: i64,
    pub indicators: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// (symbol, name, market cap), largest first.
    pub largest: Vec<(String, String, f64)>,
}

pub trait StoragePort {
    fn initialize_schema(&self) -> Result<(), YenesisError>;

    /// Insert or update by symbol; returns the ticker id.
    fn upsert_ticker(&self, info: &TickerInfo) -> Result<i64, YenesisError>;

    /// Upsert bars on (ticker, date); returns rows written.
    fn store_prices(&self, ticker_id: i64, bars: &[OhlcvBar]) -> Result<usize, YenesisError>;

    /// Upsert indicator rows on (ticker, date). Rows missing both SMA20 and
    /// EMA50 are skipped; returns rows written.
    fn store_indicators(&self, ticker_id: i64, rows: &[IndicatorRow])
    -> Result<usize, YenesisError>;

    fn ticker_id(&self, symbol: &str) -> Result<Option<i64>, YenesisError>;

    /// Prices in `[start, end]` with their indicators, oldest first.
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryRow>, YenesisError>;

    fn stats(&self) -> Result<DbStats, YenesisError>;

    /// Delete prices and indicators older than `today - days_to_keep`.
    /// Returns (prices deleted, indicators deleted).
    fn cleanup(&self, days_to_keep: u32, today: NaiveDate) -> Result<(usize, usize), YenesisError>;
}
