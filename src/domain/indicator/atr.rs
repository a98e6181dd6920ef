//! Average True Range, Wilder smoothing seeded with an SMA of true ranges.
//!
//! TR[0] = high - low; TR[i] uses the previous close.
//! ATR[n-1] = mean(TR[0..n]); ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let values = atr_values(bars, period)
        .into_iter()
        .zip(bars)
        .map(|(atr, bar)| IndicatorPoint {
            date: bar.date,
            valid: atr.is_some(),
            value: IndicatorValue::Simple(atr.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

/// Raw ATR per bar, `None` inside warmup.
pub(crate) fn atr_values(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    let mut tr_sum = 0.0;
    let mut atr = 0.0;
    let n = period as f64;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i + 1 < period {
            tr_sum += tr;
            out.push(None);
        } else if i + 1 == period {
            tr_sum += tr;
            atr = tr_sum / n;
            out.push(Some(atr));
        } else {
            atr = (atr * (n - 1.0) + tr) / n;
            out.push(Some(atr));
        }
    }
    out
}
