//! Relative momentum ranking against a benchmark.
//!
//! Each ticker is scored on five ROC windows. A window passes only when the
//! stock clearly beats the benchmark: at least twice its ROC in a rising
//! market, or any positive ROC in a falling one. The relative ROC of every
//! passing window is turned into a z-score against its own history; the
//! weighted sum is squashed into 0..100.

use crate::domain::indicator::{calculate_roc, ema_values, IndicatorSeries, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::stats::{DEFAULT_MIN_HISTORY, scale_score, z_score};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

pub const ROC_WINDOWS: [usize; 5] = [5, 21, 50, 100, 200];
pub const REGIME_EMA_SPAN: usize = 200;

pub fn window_weight(window: usize) -> f64 {
    match window {
        5 | 21 => 0.3,
        50 => 0.2,
        100 | 200 => 0.1,
        _ => 0.0,
    }
}

/// Bars needed before a ticker can be ranked.
pub fn min_bars() -> usize {
    ROC_WINDOWS.iter().max().copied().unwrap_or(0) + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeReport {
    pub benchmark: String,
    pub date: NaiveDate,
    pub latest_close: f64,
    pub latest_ema: f64,
}

impl RegimeReport {
    pub fn is_weak(&self) -> bool {
        self.latest_close < self.latest_ema
    }

    pub fn difference(&self) -> f64 {
        self.latest_close - self.latest_ema
    }
}

/// Latest benchmark close against its EMA(200). `None` for an empty series.
pub fn market_regime(benchmark: &str, bars: &[OhlcvBar]) -> Option<RegimeReport> {
    let last = bars.last()?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let latest_ema = *ema_values(&closes, REGIME_EMA_SPAN).last()?;
    Some(RegimeReport {
        benchmark: benchmark.to_string(),
        date: last.date,
        latest_close: last.close,
        latest_ema,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowPrices {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_price: f64,
    pub end_price: f64,
    pub benchmark_start_price: Option<f64>,
    pub benchmark_end_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowScore {
    pub window: usize,
    pub stock_roc: f64,
    pub bench_roc: f64,
    pub z: f64,
    pub prices: Option<WindowPrices>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumRecord {
    pub ticker: String,
    pub market_cap: f64,
    pub momentum_score: f64,
    pub windows: Vec<WindowScore>,
}

impl MomentumRecord {
    pub fn window(&self, window: usize) -> Option<&WindowScore> {
        self.windows.iter().find(|w| w.window == window)
    }

    /// End price of the shortest window, the most recent close we report.
    pub fn latest_price(&self) -> Option<f64> {
        self.window(ROC_WINDOWS[0])
            .and_then(|w| w.prices.as_ref())
            .map(|p| p.end_price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientData { bars: usize, minimum: usize },
    MissingRoc { window: usize },
    Underperformed { window: usize, stock: f64, bench: f64 },
    NoZScore { window: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientData { bars, minimum } => {
                write!(f, "insufficient data ({} bars, need {})", bars, minimum)
            }
            Rejection::MissingRoc { window } => write!(f, "no ROC for {}-bar window", window),
            Rejection::Underperformed {
                window,
                stock,
                bench,
            } => write!(
                f,
                "{}-bar ROC {:.4} does not beat benchmark {:.4}",
                window, stock, bench
            ),
            Rejection::NoZScore { window } => write!(f, "no z-score for {}-bar window", window),
        }
    }
}

/// Whether a stock ROC clears the benchmark rule for one window.
pub fn beats_benchmark(stock: f64, bench: f64) -> bool {
    if bench > 0.0 {
        stock >= 2.0 * bench
    } else {
        stock > 0.0
    }
}

fn valid_points(series: &IndicatorSeries) -> Vec<(NaiveDate, f64)> {
    series
        .values
        .iter()
        .filter(|p| p.valid)
        .filter_map(|p| match p.value {
            IndicatorValue::Simple(v) => Some((p.date, v)),
            _ => None,
        })
        .collect()
}

/// Stock ROC minus benchmark ROC on dates both have, dropping the latest point.
fn relative_history(stock: &IndicatorSeries, bench: &IndicatorSeries) -> Vec<f64> {
    let bench_by_date: HashMap<NaiveDate, f64> = valid_points(bench).into_iter().collect();
    let mut history: Vec<f64> = valid_points(stock)
        .into_iter()
        .filter_map(|(date, s)| bench_by_date.get(&date).map(|b| s - b))
        .collect();
    history.pop();
    history
}

fn window_prices(bars: &[OhlcvBar], benchmark: &[OhlcvBar], window: usize) -> Option<WindowPrices> {
    if bars.len() <= window {
        return None;
    }
    let end = bars.last()?;
    let start = &bars[bars.len() - 1 - window];
    let bench_close = |date: NaiveDate| {
        benchmark
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| benchmark[i].close)
    };
    Some(WindowPrices {
        start_date: start.date,
        end_date: end.date,
        start_price: start.close,
        end_price: end.close,
        benchmark_start_price: bench_close(start.date),
        benchmark_end_price: bench_close(end.date),
    })
}

/// Score one ticker against the benchmark. Bars must already be trimmed to
/// the as-of date and sorted by date.
pub fn score_ticker(
    ticker: &str,
    market_cap: f64,
    bars: &[OhlcvBar],
    benchmark: &[OhlcvBar],
) -> Result<MomentumRecord, Rejection> {
    let minimum = min_bars();
    if bars.len() < minimum {
        return Err(Rejection::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }

    let mut windows = Vec::with_capacity(ROC_WINDOWS.len());
    let mut weighted_z = 0.0;

    for window in ROC_WINDOWS {
        let stock_roc = calculate_roc(bars, window);
        let bench_roc = calculate_roc(benchmark, window);

        let (Some(latest_stock), Some(latest_bench)) =
            (stock_roc.latest_simple(), bench_roc.latest_simple())
        else {
            return Err(Rejection::MissingRoc { window });
        };

        if !beats_benchmark(latest_stock, latest_bench) {
            return Err(Rejection::Underperformed {
                window,
                stock: latest_stock,
                bench: latest_bench,
            });
        }

        let history = relative_history(&stock_roc, &bench_roc);
        let z = z_score(latest_stock - latest_bench, &history, DEFAULT_MIN_HISTORY)
            .ok_or(Rejection::NoZScore { window })?;
        weighted_z += window_weight(window) * z;

        windows.push(WindowScore {
            window,
            stock_roc: latest_stock,
            bench_roc: latest_bench,
            z,
            prices: window_prices(bars, benchmark, window),
        });
    }

    Ok(MomentumRecord {
        ticker: ticker.to_string(),
        market_cap,
        momentum_score: scale_score(Some(weighted_z)),
        windows,
    })
}

/// Highest score first.
pub fn rank(records: &mut [MomentumRecord]) {
    records.sort_by(|a, b| b.momentum_score.total_cmp(&a.momentum_score));
}

/// Benchmark's own window prices and ROC, for the first report row.
pub fn benchmark_windows(benchmark: &[OhlcvBar]) -> Vec<(usize, Option<WindowPrices>, Option<f64>)> {
    ROC_WINDOWS
        .iter()
        .map(|&w| {
            let roc = calculate_roc(benchmark, w).latest_simple();
            (w, window_prices(benchmark, benchmark, w), roc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                symbol: symbol.into(),
                date: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adjusted_close: c,
                volume: 1,
            })
            .collect()
    }

    /// Benchmark drifting up slowly with a wobble, so every ROC has spread.
    fn benchmark(n: usize) -> Vec<OhlcvBar> {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 * (1.0 + 0.0005 * i as f64) + (i as f64 * 0.7).sin())
            .collect();
        series("^GSPC", &closes)
    }

    /// Stock that tracks the benchmark and then accelerates hard at the end.
    fn leader(n: usize) -> Vec<OhlcvBar> {
        let closes: Vec<f64> = (0..n)
            .map(|i| {
                let base = 50.0 * (1.0 + 0.0005 * i as f64) + (i as f64 * 0.9).cos();
                let boost = if i + 5 >= n {
                    1.0 + 0.08 * (i + 6 - n) as f64
                } else {
                    1.0
                };
                base * (1.0 + 0.002 * i as f64) * boost
            })
            .collect();
        series("LEAD", &closes)
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = ROC_WINDOWS.iter().map(|&w| window_weight(w)).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn benchmark_rule() {
        assert!(beats_benchmark(0.10, 0.05));
        assert!(!beats_benchmark(0.09, 0.05));
        assert!(beats_benchmark(0.01, -0.03));
        assert!(!beats_benchmark(0.0, -0.03));
        assert!(!beats_benchmark(0.0, 0.0));
    }

    #[test]
    fn regime_weak_when_below_ema() {
        let mut closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64 * 0.1).collect();
        closes.extend((0..30).map(|i| 120.0 - i as f64 * 2.0));
        let report = market_regime("^GSPC", &series("^GSPC", &closes)).unwrap();
        assert!(report.is_weak());
        assert!(report.difference() < 0.0);

        let rising: Vec<f64> = (0..250).map(|i| 100.0 + i as f64).collect();
        assert!(!market_regime("^GSPC", &series("^GSPC", &rising)).unwrap().is_weak());
        assert!(market_regime("^GSPC", &[]).is_none());
    }

    #[test]
    fn short_history_is_rejected() {
        let bench = benchmark(300);
        let stock = series("NEW", &[10.0; 150]);
        assert_eq!(
            score_ticker("NEW", 1e10, &stock, &bench),
            Err(Rejection::InsufficientData {
                bars: 150,
                minimum: 201
            })
        );
    }

    #[test]
    fn laggard_is_rejected() {
        let bench = benchmark(300);
        let closes: Vec<f64> = (0..300).map(|i| 80.0 - i as f64 * 0.05).collect();
        let result = score_ticker("LAG", 1e10, &series("LAG", &closes), &bench);
        assert!(matches!(result, Err(Rejection::Underperformed { .. })));
    }

    #[test]
    fn leader_scores_above_midpoint() {
        let bench = benchmark(300);
        let stock = leader(300);
        let record = score_ticker("LEAD", 2e10, &stock, &bench).unwrap();
        assert_eq!(record.windows.len(), ROC_WINDOWS.len());
        assert!(record.momentum_score > 50.0);
        assert!(record.momentum_score <= 100.0);

        let five = record.window(5).unwrap();
        let prices = five.prices.as_ref().unwrap();
        assert_eq!(prices.end_date, stock.last().unwrap().date);
        assert_eq!(prices.start_date, stock[stock.len() - 6].date);
        assert_eq!(prices.benchmark_end_price, Some(bench.last().unwrap().close));
        assert_eq!(record.latest_price(), Some(stock.last().unwrap().close));
    }

    #[test]
    fn rank_sorts_descending() {
        let make = |t: &str, s: f64| MomentumRecord {
            ticker: t.into(),
            market_cap: 0.0,
            momentum_score: s,
            windows: vec![],
        };
        let mut records = vec![make("A", 40.0), make("B", 90.0), make("C", 65.0)];
        rank(&mut records);
        let order: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[test]
    fn benchmark_windows_cover_every_window() {
        let bench = benchmark(300);
        let rows = benchmark_windows(&bench);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|(_, prices, roc)| prices.is_some() && roc.is_some()));
    }
}
