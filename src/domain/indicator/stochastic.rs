//! Stochastic oscillator.
//!
//! %K = 100 * (C - LL(k)) / (HH(k) - LL(k)), 50 when the range is flat.
//! %D = SMA(d) of %K. Warmup: k - 1 + d - 1 bars.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let k_values: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            if hh == ll {
                Some(50.0)
            } else {
                Some(100.0 * (bars[i].close - ll) / (hh - ll))
            }
        })
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let d = if i + 1 >= d_period {
                k_values[i + 1 - d_period..=i]
                    .iter()
                    .copied()
                    .collect::<Option<Vec<f64>>>()
                    .map(|ks| ks.iter().sum::<f64>() / d_period as f64)
            } else {
                None
            };
            match (k_values[i], d) {
                (Some(k), Some(d)) => IndicatorPoint {
                    date: bar.date,
                    valid: true,
                    value: IndicatorValue::Stochastic { k, d },
                },
                _ => IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{bar, from_closes};

    #[test]
    fn close_at_high_is_100() {
        let bars: Vec<OhlcvBar> = (0..5)
            .map(|i| {
                let c = 10.0 + i as f64;
                bar(i, c, c, c - 1.0, c)
            })
            .collect();
        let series = calculate_stochastic(&bars, 3, 1);
        assert_eq!(
            series.latest(),
            Some(&IndicatorValue::Stochastic { k: 100.0, d: 100.0 })
        );
    }

    #[test]
    fn flat_range_is_midpoint() {
        let series = calculate_stochastic(&from_closes(&[5.0; 6]), 3, 3);
        assert_eq!(
            series.latest(),
            Some(&IndicatorValue::Stochastic { k: 50.0, d: 50.0 })
        );
        assert!(!series.values[3].valid);
        assert!(series.values[4].valid);
    }
}
