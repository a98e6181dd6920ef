//! Price bar representation shared by every screener and the store.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// (high + low) / 2, the SuperTrend midpoint.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Keep only bars dated on or before `as_of`. Bars are assumed sorted.
pub fn trim_to(bars: &[OhlcvBar], as_of: Option<NaiveDate>) -> &[OhlcvBar] {
    match as_of {
        Some(limit) => {
            let end = bars.partition_point(|b| b.date <= limit);
            &bars[..end]
        }
        None => bars,
    }
}

pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
