//! Stocks trading close to their 52-week high.

use crate::domain::ohlcv::OhlcvBar;

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const DEFAULT_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct NearHigh {
    pub ticker: String,
    pub current_price: f64,
    pub high_52w: f64,
}

impl NearHigh {
    pub fn distance(&self) -> f64 {
        (self.high_52w - self.current_price) / self.high_52w
    }
}

/// Highest high over the last year of bars, compared with the last close.
pub fn near_high(ticker: &str, bars: &[OhlcvBar], threshold: f64) -> Option<NearHigh> {
    let current_price = bars.last()?.close;
    let window = &bars[bars.len().saturating_sub(TRADING_DAYS_PER_YEAR)..];
    let high_52w = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    if high_52w <= 0.0 {
        return None;
    }
    let candidate = NearHigh {
        ticker: ticker.to_string(),
        current_price,
        high_52w,
    };
    (candidate.distance() <= threshold).then_some(candidate)
}
