//! Crypto momentum: trailing percentage changes over daily closes.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::stats::pct_change;

pub const QUOTE_SUFFIX: &str = "-USD";
pub const HISTORY_DAYS: u32 = 90;
pub const MIN_BARS: usize = 31;

#[derive(Debug, Clone, PartialEq)]
pub struct CryptoMomentum {
    pub symbol: String,
    pub change_1d: f64,
    pub change_7d: f64,
    pub change_30d: f64,
    pub change_90d: f64,
}

pub fn quote_symbol(base: &str) -> String {
    format!("{}{}", base.trim(), QUOTE_SUFFIX)
}

/// `None` when fewer than [`MIN_BARS`] closes are available. The 90-day change
/// is measured from the first bar of the series.
pub fn momentum(symbol: &str, bars: &[OhlcvBar]) -> Option<CryptoMomentum> {
    if bars.len() < MIN_BARS {
        return None;
    }
    let n = bars.len();
    let last = bars[n - 1].close;
    Some(CryptoMomentum {
        symbol: symbol.to_string(),
        change_1d: pct_change(last, bars[n - 2].close),
        change_7d: pct_change(last, bars[n - 8].close),
        change_30d: pct_change(last, bars[n - 31].close),
        change_90d: pct_change(last, bars[0].close),
    })
}

/// Best 90-day performers first; NaN changes sink to the bottom.
pub fn top_by_90d(mut results: Vec<CryptoMomentum>, n: usize) -> Vec<CryptoMomentum> {
    results.sort_by(|a, b| {
        let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
        key(b.change_90d).total_cmp(&key(a.change_90d))
    });
    results.truncate(n);
    results
}
