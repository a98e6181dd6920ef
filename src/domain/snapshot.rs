//! Daily indicator rows persisted next to the price history.

use crate::domain::indicator::{
    IndicatorSeries, IndicatorValue, calculate_atr, calculate_bollinger, calculate_ema,
    calculate_macd, calculate_rsi, calculate_sma,
};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub sma_20: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorRow {
    pub fn blank(date: NaiveDate) -> Self {
        Self {
            date,
            sma_20: None,
            ema_50: None,
            ema_200: None,
            rsi_14: None,
            macd: None,
            macd_signal: None,
            bb_upper: None,
            bb_lower: None,
            atr: None,
        }
    }

    /// Rows without the two trend averages carry nothing worth storing.
    pub fn is_storable(&self) -> bool {
        self.sma_20.is_some() || self.ema_50.is_some()
    }
}

fn valid_at(series: &IndicatorSeries, index: usize) -> Option<&IndicatorValue> {
    series
        .values
        .get(index)
        .filter(|p| p.valid)
        .map(|p| &p.value)
}

/// One row per bar; values are `None` inside each indicator's warmup.
pub fn indicator_rows(bars: &[OhlcvBar]) -> Vec<IndicatorRow> {
    let sma20 = calculate_sma(bars, 20);
    let ema50 = calculate_ema(bars, 50);
    let ema200 = calculate_ema(bars, 200);
    let rsi14 = calculate_rsi(bars, 14);
    let macd = calculate_macd(bars, 12, 26, 9);
    let bollinger = calculate_bollinger(bars, 20, 200);
    let atr14 = calculate_atr(bars, 14);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut row = IndicatorRow::blank(bar.date);
            row.sma_20 = sma20.simple_at(i);
            row.ema_50 = ema50.simple_at(i);
            row.ema_200 = ema200.simple_at(i);
            row.rsi_14 = rsi14.simple_at(i);
            row.atr = atr14.simple_at(i);
            if let Some(IndicatorValue::Macd { line, signal, .. }) = valid_at(&macd, i) {
                row.macd = Some(*line);
                row.macd_signal = Some(*signal);
            }
            if let Some(IndicatorValue::Bollinger { upper, lower, .. }) = valid_at(&bollinger, i) {
                row.bb_upper = Some(*upper);
                row.bb_lower = Some(*lower);
            }
            row
        })
        .collect()
}
