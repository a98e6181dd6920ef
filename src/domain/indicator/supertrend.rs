//! SuperTrend with ratcheting bands.
//!
//! basic bands = hl2 ± multiplier × ATR(period). Direction flips to +1 when the
//! close breaks the previous upper band and to -1 when it breaks the previous
//! lower band. While the direction holds, the active band may only tighten.
//! The trend line is the lower band in an uptrend and the upper band otherwise.
//! Warmup follows ATR: first (period-1) bars are invalid.

use crate::domain::indicator::atr::atr_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 10;
pub const DEFAULT_MULT_X100: u32 = 300;

pub fn calculate_supertrend(
    bars: &[OhlcvBar],
    period: usize,
    multiplier_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::SuperTrend {
        period,
        multiplier_x100,
    };
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let mult = multiplier_x100 as f64 / 100.0;
    let atr = atr_values(bars, period);
    let mut values = Vec::with_capacity(bars.len());

    let mut prev: Option<(f64, f64)> = None;
    let mut direction: i8 = 1;

    for (i, bar) in bars.iter().enumerate() {
        let Some(atr) = atr[i] else {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: false,
                value: IndicatorValue::SuperTrend {
                    line: 0.0,
                    direction: 0,
                },
            });
            continue;
        };

        let mut upper = bar.hl2() + mult * atr;
        let mut lower = bar.hl2() - mult * atr;

        if let Some((prev_upper, prev_lower)) = prev {
            if bar.close > prev_upper {
                direction = 1;
            } else if bar.close < prev_lower {
                direction = -1;
            } else {
                if direction > 0 && lower < prev_lower {
                    lower = prev_lower;
                }
                if direction < 0 && upper > prev_upper {
                    upper = prev_upper;
                }
            }
        }
        prev = Some((upper, lower));

        let line = if direction > 0 { lower } else { upper };
        values.push(IndicatorPoint {
            date: bar.date,
            valid: true,
            value: IndicatorValue::SuperTrend { line, direction },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Latest (line, direction), if the series is out of warmup.
pub fn latest_supertrend(series: &IndicatorSeries) -> Option<(f64, i8)> {
    match series.latest() {
        Some(IndicatorValue::SuperTrend { line, direction }) => Some((*line, *direction)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::bar;

    fn trending(start: f64, step: f64, n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let c = start + step * i as f64;
                bar(i, c, c + 1.0, c - 1.0, c)
            })
            .collect()
    }

    #[test]
    fn uptrend_is_bullish_with_line_below_price() {
        let bars = trending(100.0, 2.0, 40);
        let series = calculate_supertrend(&bars, 10, 300);
        let (line, direction) = latest_supertrend(&series).unwrap();
        assert_eq!(direction, 1);
        assert!(line < bars.last().unwrap().close);
    }

    #[test]
    fn crash_flips_bearish() {
        let mut bars = trending(100.0, 1.0, 30);
        for i in 0..15 {
            let c = 120.0 - 8.0 * i as f64;
            bars.push(bar(30 + i, c, c + 1.0, c - 1.0, c));
        }
        let series = calculate_supertrend(&bars, 10, 300);
        let (line, direction) = latest_supertrend(&series).unwrap();
        assert_eq!(direction, -1);
        assert!(line > bars.last().unwrap().close);
    }

    #[test]
    fn lower_band_never_loosens_in_uptrend() {
        let bars = trending(100.0, 1.0, 40);
        let series = calculate_supertrend(&bars, 10, 300);
        let lines: Vec<f64> = series
            .values
            .iter()
            .filter(|p| p.valid)
            .filter_map(|p| match p.value {
                IndicatorValue::SuperTrend { line, direction: 1 } => Some(line),
                _ => None,
            })
            .collect();
        assert!(lines.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn warmup_matches_atr() {
        let series = calculate_supertrend(&trending(50.0, 1.0, 12), 10, 300);
        assert!(!series.values[8].valid);
        assert!(series.values[9].valid);
    }
}
