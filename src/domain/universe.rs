//! Ticker universes: normalising lists and filtering them by market cap.

use crate::ports::market_data_port::MarketDataPort;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

/// Trim, drop blanks, deduplicate preserving first occurrence, append `suffix`.
pub fn normalize_tickers<I, S>(raw: I, suffix: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .map(|t| format!("{}{}", t, suffix))
        .collect()
}

/// 1234567890.0 -> "1.23B". Zero renders as "0".
pub fn format_market_cap(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    const UNITS: [&str; 5] = ["", "K", "M", "B", "T"];
    let mut value = value;
    let mut magnitude = 0;
    while value.abs() >= 1000.0 && magnitude < UNITS.len() - 1 {
        magnitude += 1;
        value /= 1000.0;
    }
    format!("{:.2}{}", value, UNITS[magnitude])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedTicker {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanResult {
    pub kept: Vec<String>,
    pub excluded: Vec<ExcludedTicker>,
}

/// Keep tickers whose market cap is known and at least `threshold`.
pub fn clean_tickers(
    market_data: &dyn MarketDataPort,
    tickers: &[String],
    threshold: f64,
    delay: Duration,
) -> CleanResult {
    let mut result = CleanResult::default();

    for ticker in tickers {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let reason = match market_data.fetch_profile(ticker) {
            Err(e) => Some(format!("Error: {}", e)),
            Ok(profile) => match profile.market_cap {
                None | Some(0.0) => Some("Market cap data missing or zero".to_string()),
                Some(cap) if cap < threshold => Some(format!(
                    "Market cap below threshold ({})",
                    format_market_cap(cap)
                )),
                Some(_) => None,
            },
        };

        match reason {
            None => result.kept.push(ticker.clone()),
            Some(reason) => {
                tracing::info!("Excluded {}: {}", ticker, reason);
                result.excluded.push(ExcludedTicker {
                    ticker: ticker.clone(),
                    reason,
                });
            }
        }
    }

    result
}
