//! Momentum ranking job: regime check, per-ticker scoring, report and alerts.

use crate::adapters::csv_adapter;
use crate::domain::error::YenesisError;
use crate::domain::momentum::{
    self, MomentumRecord, RegimeReport, WindowPrices, benchmark_windows, market_regime, score_ticker,
};
use crate::domain::ohlcv::trim_to;
use crate::domain::region::RegionConfig;
use crate::jobs::{GeneralSettings, notify, pause};
use crate::ports::market_data_port::{HistoryRange, Interval, MarketDataPort};
use crate::ports::notifier_port::{Notification, NotifierPort};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

pub const HISTORY_YEARS: u32 = 2;
pub const TELEGRAM_TOP: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum MomentumOutcome {
    /// Benchmark below its EMA(200); nothing was ranked.
    WeakMarket(RegimeReport),
    /// Benchmark history unavailable.
    NoBenchmark,
    Ranked(Ranking),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    pub records: Vec<MomentumRecord>,
    pub invalid: Vec<String>,
    pub benchmark: Vec<(usize, Option<WindowPrices>, Option<f64>)>,
}

/// Rank `tickers` against the region benchmark, highest score first.
pub fn rank_universe(
    market_data: &dyn MarketDataPort,
    tickers: &[String],
    region: &RegionConfig,
    as_of: Option<NaiveDate>,
    settings: &GeneralSettings,
) -> Result<MomentumOutcome, YenesisError> {
    let benchmark = match market_data.fetch_history(
        &region.benchmark_ticker,
        HistoryRange::Years(HISTORY_YEARS),
        Interval::Daily,
    ) {
        Ok(bars) => trim_to(&bars, as_of).to_vec(),
        Err(e) if e.is_data_gap() => Vec::new(),
        Err(e) => return Err(e),
    };

    let Some(regime) = market_regime(&region.benchmark_ticker, &benchmark) else {
        tracing::warn!("No benchmark data for {}", region.benchmark_ticker);
        return Ok(MomentumOutcome::NoBenchmark);
    };
    if regime.is_weak() {
        tracing::warn!(
            "{} closed at {:.2} below its EMA{} {:.2}; skipping ranking",
            regime.benchmark,
            regime.latest_close,
            momentum::REGIME_EMA_SPAN,
            regime.latest_ema
        );
        return Ok(MomentumOutcome::WeakMarket(regime));
    }

    let mut ranking = Ranking {
        benchmark: benchmark_windows(&benchmark),
        ..Ranking::default()
    };

    for (i, ticker) in tickers.iter().enumerate() {
        pause(settings.request_delay);
        tracing::debug!("[{}/{}] {}", i + 1, tickers.len(), ticker);

        let market_cap = match market_data.fetch_profile(ticker) {
            Ok(profile) => profile.market_cap,
            Err(e) if e.is_data_gap() => None,
            Err(e) => {
                tracing::warn!("Profile fetch failed for {}: {}", ticker, e);
                ranking.invalid.push(ticker.clone());
                continue;
            }
        };
        let Some(market_cap) = market_cap.filter(|cap| *cap >= region.marketcap_threshold) else {
            continue;
        };

        let bars = match market_data.fetch_history(ticker, HistoryRange::Years(HISTORY_YEARS), Interval::Daily) {
            Ok(bars) => trim_to(&bars, as_of).to_vec(),
            Err(e) if e.is_data_gap() => {
                tracing::info!("Skipping {}: {}", ticker, e);
                continue;
            }
            Err(e) => {
                tracing::warn!("History fetch failed for {}: {}", ticker, e);
                ranking.invalid.push(ticker.clone());
                continue;
            }
        };

        match score_ticker(ticker, market_cap, &bars, &benchmark) {
            Ok(record) => {
                tracing::info!("{} scored {:.2}", ticker, record.momentum_score);
                ranking.records.push(record);
            }
            Err(rejection) => tracing::info!("Skipping {}: {}", ticker, rejection),
        }
    }

    momentum::rank(&mut ranking.records);
    Ok(MomentumOutcome::Ranked(ranking))
}

/// `1. NVDA - $123.45 (Score: 87.12)` lines under a bold title.
pub fn telegram_ranking(records: &[MomentumRecord], top: usize) -> String {
    if records.is_empty() {
        return "No momentum ranking data available to report.".to_string();
    }
    let mut text = format!("*Top {} Momentum Stocks*\n\n", top);
    for (i, record) in records.iter().take(top).enumerate() {
        let price = record
            .latest_price()
            .map(|p| format!("${:.2}", p))
            .unwrap_or_else(|| "N/A".to_string());
        text.push_str(&format!(
            "{}. {} - {} (Score: {:.2})\n",
            i + 1,
            record.ticker,
            price,
            record.momentum_score
        ));
    }
    text
}

pub fn weak_market_notification(regime: &RegimeReport) -> Notification {
    let body = format!(
        "Market regime filter triggered.\n\n\
         Benchmark: {}\nLatest close: {:.2}\nEMA{}: {:.2}\nDifference: {:.2}\nDate: {}\n\n\
         Momentum ranking skipped.",
        regime.benchmark,
        regime.latest_close,
        momentum::REGIME_EMA_SPAN,
        regime.latest_ema,
        regime.difference(),
        regime.date
    );
    Notification::new("Momentum Ranking Skipped: Weak Market", body)
}

/// Full momentum run: load the region universe, rank, write the report and
/// notify. Returns the report path when a ranking was written.
pub fn run_momentum(
    market_data: &dyn MarketDataPort,
    notifier: &dyn NotifierPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    as_of: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<Option<PathBuf>, YenesisError> {
    let tickers = csv_adapter::load_tickers(&settings.data_file(&region.momentum_csv), &region.suffix)?;

    let ranking = match rank_universe(market_data, &tickers, region, as_of, settings)? {
        MomentumOutcome::WeakMarket(regime) => {
            notify(notifier, &weak_market_notification(&regime));
            return Ok(None);
        }
        MomentumOutcome::NoBenchmark => return Ok(None),
        MomentumOutcome::Ranked(ranking) => ranking,
    };

    if !ranking.invalid.is_empty() {
        let path = settings.report_file("invalid_tickers.csv");
        csv_adapter::write_invalid_tickers(&path, &ranking.invalid)?;
        tracing::info!("{} invalid tickers written to {}", ranking.invalid.len(), path.display());
    }

    let output = settings.momentum_report(region);
    csv_adapter::write_momentum_report(&output, &ranking.benchmark, &ranking.records, now)?;

    let generated = now.format("%Y-%m-%d %H:%M:%S");
    let notification = Notification::new(
        "Momentum Ranking Report",
        format!(
            "Please find attached the momentum ranking report generated on {}.",
            generated
        ),
    )
    .with_attachment(&output)
    .with_chat_text(telegram_ranking(&ranking.records, TELEGRAM_TOP));
    notify(notifier, &notification);

    Ok(Some(output))
}
