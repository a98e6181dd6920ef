//! Rolling population standard deviation of closes.
//!
//! STDDEV(n)[i] = sqrt(sum((C[j] - mean)^2 for j in i-n+1..=i) / n)
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stddev(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Stddev(period));
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let stats = window_mean_std(bars, i, period);
            IndicatorPoint {
                date: bar.date,
                valid: stats.is_some(),
                value: IndicatorValue::Simple(stats.map_or(0.0, |(_, sd)| sd)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}

/// Mean and population stddev of the `period` closes ending at `end`.
pub(crate) fn window_mean_std(bars: &[OhlcvBar], end: usize, period: usize) -> Option<(f64, f64)> {
    if period == 0 || end + 1 < period || end >= bars.len() {
        return None;
    }
    let window = &bars[end + 1 - period..=end];
    let n = period as f64;
    let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|b| (b.close - mean).powi(2))
        .sum::<f64>()
        / n;
    Some((mean, variance.sqrt()))
}
