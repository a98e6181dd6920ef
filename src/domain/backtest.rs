//! SMA20/EMA50 crossover backtest over stored history.
//!
//! The daily signal is +1 while SMA20 is above EMA50, -1 while below and 0
//! when either average is missing or they are equal. The position is the
//! day-over-day change of the signal and earns the next day's return.

use crate::ports::storage_port::HistoryRow;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_return: f64,
    pub buy_hold_return: f64,
    pub outperformance: f64,
    pub max_drawdown: f64,
    pub trades: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub buy_hold: f64,
    pub strategy: f64,
}

fn crossover_signal(row: &HistoryRow) -> i32 {
    match (row.indicators.sma_20, row.indicators.ema_50) {
        (Some(sma), Some(ema)) if sma > ema => 1,
        (Some(sma), Some(ema)) if sma < ema => -1,
        _ => 0,
    }
}

/// Position changes: `None` for the first row, which has no prior signal.
pub fn positions(rows: &[HistoryRow]) -> Vec<Option<i32>> {
    let signals: Vec<i32> = rows.iter().map(crossover_signal).collect();
    (0..signals.len())
        .map(|i| (i > 0).then(|| signals[i] - signals[i - 1]))
        .collect()
}

/// Cumulative growth of 1.0 for buy-and-hold and for the strategy.
pub fn equity_curves(rows: &[HistoryRow]) -> Vec<CurvePoint> {
    let positions = positions(rows);
    let mut buy_hold = 1.0;
    let mut strategy = 1.0;
    let mut curve = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            let prev_close = rows[i - 1].bar.close;
            if prev_close != 0.0 {
                let daily = row.bar.close / prev_close - 1.0;
                buy_hold *= 1.0 + daily;
                if let Some(held) = positions[i - 1] {
                    strategy *= 1.0 + held as f64 * daily;
                }
            }
        }
        curve.push(CurvePoint {
            date: row.bar.date,
            buy_hold,
            strategy,
        });
    }
    curve
}

pub fn max_drawdown(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max(1.0 - v / peak);
        }
    }
    max_dd
}

/// `None` when there is no history to test.
pub fn run_crossover(symbol: &str, rows: &[HistoryRow]) -> Option<BacktestResult> {
    let first = rows.first()?;
    let last = rows.last()?;
    let curve = equity_curves(rows);
    let final_point = curve.last()?;

    let total_return = final_point.strategy - 1.0;
    let buy_hold_return = final_point.buy_hold - 1.0;
    let trades = positions(rows)
        .into_iter()
        .filter(|p| matches!(p, Some(change) if *change != 0))
        .count();

    Some(BacktestResult {
        symbol: symbol.to_string(),
        start_date: first.bar.date,
        end_date: last.bar.date,
        total_return,
        buy_hold_return,
        outperformance: total_return - buy_hold_return,
        max_drawdown: max_drawdown(curve.iter().map(|p| p.strategy)),
        trades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use crate::domain::snapshot::IndicatorRow;
    use approx::assert_relative_eq;

    fn rows(closes: &[f64], trend: &[(Option<f64>, Option<f64>)]) -> Vec<HistoryRow> {
        from_closes(closes)
            .into_iter()
            .zip(trend)
            .map(|(bar, &(sma, ema))| {
                let mut indicators = IndicatorRow::blank(bar.date);
                indicators.sma_20 = sma;
                indicators.ema_50 = ema;
                HistoryRow { bar, indicators }
            })
            .collect()
    }

    #[test]
    fn empty_history() {
        assert!(run_crossover("AAPL", &[]).is_none());
    }

    #[test]
    fn cross_up_earns_following_return() {
        let closes = [100.0, 100.0, 110.0, 121.0];
        let trend = [
            (Some(1.0), Some(2.0)),
            (Some(2.0), Some(1.0)),
            (Some(2.0), Some(1.0)),
            (Some(2.0), Some(1.0)),
        ];
        let result = run_crossover("AAPL", &rows(&closes, &trend)).unwrap();
        // Position change of +2 on day 1 is applied to day 2's +10%.
        assert_relative_eq!(result.total_return, 0.2, epsilon = 1e-12);
        assert_relative_eq!(result.buy_hold_return, 0.21, epsilon = 1e-12);
        assert_relative_eq!(result.outperformance, -0.01, epsilon = 1e-12);
        assert_eq!(result.trades, 1);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(result.end_date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn missing_averages_are_flat() {
        let closes = [100.0, 90.0, 80.0];
        let trend = [(None, None), (None, Some(1.0)), (None, None)];
        let result = run_crossover("FLAT", &rows(&closes, &trend)).unwrap();
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.trades, 0);
        assert_relative_eq!(result.buy_hold_return, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn drawdown_from_peak() {
        assert_relative_eq!(max_drawdown([1.0, 1.2, 0.9, 1.1]), 0.25, epsilon = 1e-12);
        assert_eq!(max_drawdown([1.0, 1.1, 1.2]), 0.0);
    }
}
