//! Yahoo Finance adapter for [`MarketDataPort`].
//!
//! Uses the public chart endpoint for bars and quoteSummary for profiles.
//! Every request goes through [`retry_with_backoff`].

use crate::adapters::retry::{RetryPolicy, retry_with_backoff};
use crate::domain::error::YenesisError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::{HistoryRange, Interval, MarketDataPort, TickerProfile};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const PROFILE_MODULES: &str =
    "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    base_url: String,
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self, YenesisError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(timeout)
            .build()
            .map_err(|e| YenesisError::market_data("*", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            policy,
        })
    }

    /// Built from `[market_data]`: `base_url`, `retries`, `backoff_secs`, `timeout_secs`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let base_url = config
            .get_string("market_data", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let policy = RetryPolicy {
            retries: config.get_int("market_data", "retries", 3).max(1) as u32,
            backoff: Duration::from_secs(config.get_int("market_data", "backoff_secs", 1).max(0) as u64),
        };
        let timeout = Duration::from_secs(config.get_int("market_data", "timeout_secs", 30).max(1) as u64);
        Self::new(&base_url, timeout, policy)
    }

    fn chart_url(&self, symbol: &str, range: HistoryRange, interval: Interval) -> String {
        let span = match range {
            HistoryRange::Years(y) => format!("range={}y", y),
            HistoryRange::Days(d) => {
                let end = Utc::now();
                let start = end - ChronoDuration::days(d as i64);
                format!("period1={}&period2={}", start.timestamp(), end.timestamp())
            }
            HistoryRange::Between(start, end) => {
                let start = start.and_time(NaiveTime::MIN).and_utc();
                // period2 is exclusive
                let end = (end + ChronoDuration::days(1)).and_time(NaiveTime::MIN).and_utc();
                format!("period1={}&period2={}", start.timestamp(), end.timestamp())
            }
        };
        format!(
            "{}/v8/finance/chart/{}?{}&interval={}&events=history",
            self.base_url,
            symbol,
            span,
            interval.as_query()
        )
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, symbol: &str, url: &str) -> Result<T, YenesisError> {
        tracing::debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| YenesisError::market_data(symbol, e))?
            .json::<T>()
            .map_err(|e| YenesisError::market_data(symbol, e))
    }
}

impl MarketDataPort for YahooAdapter {
    fn fetch_history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, YenesisError> {
        let url = self.chart_url(symbol, range, interval);
        let bars = retry_with_backoff(symbol, self.policy, |_| {
            let response: ChartResponse = self.get_json(symbol, &url)?;
            parse_chart(symbol, response)
        })?;
        tracing::info!("[{}] Yahoo Finance fetch successful ({} bars)", symbol, bars.len());
        Ok(bars)
    }

    fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, YenesisError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url, symbol, PROFILE_MODULES
        );
        retry_with_backoff(symbol, self.policy, |_| {
            let body: Value = self.get_json(symbol, &url)?;
            parse_profile(symbol, &body)
        })
    }
}

fn parse_chart(symbol: &str, response: ChartResponse) -> Result<Vec<OhlcvBar>, YenesisError> {
    if let Some(err) = response.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(YenesisError::NoData {
                symbol: symbol.to_string(),
            });
        }
        return Err(YenesisError::market_data(
            symbol,
            format!("{} - {}", err.code, err.description),
        ));
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(YenesisError::NoData {
            symbol: symbol.to_string(),
        });
    };
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = data
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(data.timestamp.len());
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        bars.push(OhlcvBar {
            symbol: symbol.to_string(),
            date: timestamp.date_naive(),
            open,
            high,
            low,
            close,
            adjusted_close: at(&adjclose).unwrap_or(close),
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    if bars.is_empty() {
        tracing::warn!("[{}] No valid data found.", symbol);
        return Err(YenesisError::NoData {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

/// `{"raw": 1.5, "fmt": "1.50"}` or a bare number.
fn raw_number(value: &Value) -> Option<f64> {
    value
        .get("raw")
        .and_then(Value::as_f64)
        .or_else(|| value.as_f64())
}

fn parse_profile(symbol: &str, body: &Value) -> Result<TickerProfile, YenesisError> {
    let Some(result) = body.pointer("/quoteSummary/result/0") else {
        return Err(YenesisError::NoData {
            symbol: symbol.to_string(),
        });
    };

    let num = |module: &str, field: &str| result.get(module).and_then(|m| m.get(field)).and_then(raw_number);
    let text = |module: &str, field: &str| {
        result
            .get(module)
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .map(String::from)
    };

    Ok(TickerProfile {
        symbol: symbol.to_string(),
        name: text("price", "longName").or_else(|| text("price", "shortName")),
        sector: text("assetProfile", "sector"),
        industry: text("assetProfile", "industry"),
        summary: text("assetProfile", "longBusinessSummary"),
        market_cap: num("price", "marketCap").or_else(|| num("summaryDetail", "marketCap")),
        trailing_pe: num("summaryDetail", "trailingPE"),
        forward_pe: num("summaryDetail", "forwardPE").or_else(|| num("defaultKeyStatistics", "forwardPE")),
        price_to_book: num("defaultKeyStatistics", "priceToBook"),
        return_on_equity: num("financialData", "returnOnEquity"),
        return_on_assets: num("financialData", "returnOnAssets"),
        gross_margins: num("financialData", "grossMargins"),
        profit_margins: num("financialData", "profitMargins")
            .or_else(|| num("defaultKeyStatistics", "profitMargins")),
        current_ratio: num("financialData", "currentRatio"),
        debt_to_equity: num("financialData", "debtToEquity"),
        earnings_growth: num("financialData", "earningsGrowth"),
        revenue_growth: num("financialData", "revenueGrowth"),
        free_cashflow: num("financialData", "freeCashflow"),
        dividend_yield: num("summaryDetail", "dividendYield"),
        held_percent_insiders: num("defaultKeyStatistics", "heldPercentInsiders"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn chart(value: Value) -> ChartResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parse_chart_drops_incomplete_rows() {
        let response = chart(json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open": [10.0, 11.0, null],
                            "high": [12.0, 12.5, 13.0],
                            "low": [9.5, 10.5, 11.0],
                            "close": [11.0, 12.0, 12.5],
                            "volume": [1000, null, 3000]
                        }],
                        "adjclose": [{"adjclose": [10.9, 11.9, 12.4]}]
                    }
                }],
                "error": null
            }
        }));
        let bars = parse_chart("AAPL", response).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].adjusted_close, 10.9);
        assert_eq!(bars[1].volume, 0);
    }

    #[test]
    fn parse_chart_empty_is_no_data() {
        let response = chart(json!({"chart": {"result": [], "error": null}}));
        assert!(matches!(
            parse_chart("ZZZ", response),
            Err(YenesisError::NoData { .. })
        ));
    }

    #[test]
    fn parse_chart_api_error() {
        let response = chart(json!({
            "chart": {"result": null, "error": {"code": "Bad Request", "description": "invalid range"}}
        }));
        let err = parse_chart("AAPL", response).unwrap_err();
        assert!(!err.is_data_gap());
        assert!(err.to_string().contains("invalid range"));
    }

    #[test]
    fn parse_profile_reads_raw_values() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "price": {"longName": "Apple Inc.", "marketCap": {"raw": 3.0e12, "fmt": "3T"}},
                    "summaryDetail": {"trailingPE": {"raw": 28.5}},
                    "financialData": {"returnOnEquity": {"raw": 1.47}, "debtToEquity": 150.2},
                    "assetProfile": {"sector": "Technology", "industry": "Consumer Electronics"}
                }],
                "error": null
            }
        });
        let profile = parse_profile("AAPL", &body).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Apple Inc."));
        assert_eq!(profile.market_cap, Some(3.0e12));
        assert_eq!(profile.trailing_pe, Some(28.5));
        assert_eq!(profile.return_on_equity, Some(1.47));
        assert_eq!(profile.debt_to_equity, Some(150.2));
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert_eq!(profile.price_to_book, None);
    }

    #[test]
    fn chart_url_for_explicit_span() {
        let adapter = YahooAdapter::new(
            "https://example.test/",
            Duration::from_secs(5),
            RetryPolicy::default(),
        )
        .unwrap();
        let url = adapter.chart_url(
            "MSFT",
            HistoryRange::Between(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ),
            Interval::Daily,
        );
        assert_eq!(
            url,
            "https://example.test/v8/finance/chart/MSFT?period1=1704067200&period2=1704240000&interval=1d&events=history"
        );
    }
}
