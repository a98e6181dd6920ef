//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid even though a running value exists.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Ema(period));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let raw = ema_values(&closes, period);

    let values = bars
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(i, (bar, ema))| {
            let valid = i + 1 >= period;
            IndicatorPoint {
                date: bar.date,
                valid,
                value: IndicatorValue::Simple(if valid { ema } else { 0.0 }),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// Running EMA over raw values with no warmup masking. Used where a full
/// series is needed, e.g. MACD signal smoothing and the benchmark regime filter.
pub fn ema_values(series: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = series.first() else {
        return Vec::new();
    };
    let k = 2.0 / (period.max(1) as f64 + 1.0);

    let mut out = Vec::with_capacity(series.len());
    let mut ema = first;
    out.push(ema);
    for &value in &series[1..] {
        ema = value * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}
