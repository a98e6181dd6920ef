//! Rate of Change as a fraction.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n]
//! A zero base close makes the point invalid. Warmup: first n bars invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_roc(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Roc(period));
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let roc = (i >= period)
                .then(|| rate_of_change(bars[i - period].close, bar.close))
                .flatten();
            IndicatorPoint {
                date: bar.date,
                valid: roc.is_some(),
                value: IndicatorValue::Simple(roc.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}

/// (end - start) / start, `None` when `start` is zero.
pub fn rate_of_change(start: f64, end: f64) -> Option<f64> {
    if start == 0.0 {
        None
    } else {
        Some((end - start) / start)
    }
}
