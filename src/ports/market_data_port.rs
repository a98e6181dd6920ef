//! Market data access port.

use crate::domain::error::YenesisError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Hourly,
}

impl Interval {
    pub fn as_query(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Hourly => "1h",
        }
    }
}

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    /// Trailing calendar days ending today.
    Days(u32),
    Years(u32),
    /// Inclusive explicit span.
    Between(NaiveDate, NaiveDate),
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryRange::Days(d) => write!(f, "{}d", d),
            HistoryRange::Years(y) => write!(f, "{}y", y),
            HistoryRange::Between(start, end) => write!(f, "{}..{}", start, end),
        }
    }
}

/// Company profile and fundamentals. Every field is optional because
/// providers omit data freely, especially for ETFs and indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub summary: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub gross_margins: Option<f64>,
    pub profit_margins: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub free_cashflow: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub held_percent_insiders: Option<f64>,
}

pub trait MarketDataPort {
    /// Bars sorted by date ascending. An empty response is `NoData`.
    fn fetch_history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, YenesisError>;

    fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, YenesisError>;
}
