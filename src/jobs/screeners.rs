//! Screener jobs: EMA pullback, ETF dip, value, 52-week high and crypto.

use crate::adapters::csv_adapter;
use crate::domain::crypto::{self, CryptoMomentum};
use crate::domain::ema_pullback::{self, PullbackSignal, apply_to_active};
use crate::domain::error::YenesisError;
use crate::domain::etf_dip::{self, DipSignal};
use crate::domain::high52::{self, NearHigh};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{AlertGate, Signal};
use crate::domain::value::{self, ValuePick};
use crate::jobs::{GeneralSettings, notify, pause};
use crate::ports::market_data_port::{HistoryRange, Interval, MarketDataPort};
use crate::ports::notifier_port::{Notification, NotifierPort};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::path::Path;

pub const EMA_LOG: &str = "ema_pullback_log.csv";
pub const ETF_LOG: &str = "signal_log.csv";
pub const ACTIVE_SIGNALS_FILE: &str = "buy_signals.txt";
pub const CRYPTO_TOP: usize = 10;
/// Calendar days the EMA pass asks for at minimum; about 275 trading bars,
/// enough for EMA200 to leave warmup.
pub const EMA_HISTORY_DAYS: u32 = 400;

fn fetch_or_skip(
    market_data: &dyn MarketDataPort,
    ticker: &str,
    range: HistoryRange,
    interval: Interval,
) -> Option<Vec<OhlcvBar>> {
    match market_data.fetch_history(ticker, range, interval) {
        Ok(bars) => Some(bars),
        Err(e) => {
            tracing::warn!("Skipping {}: {}", ticker, e);
            None
        }
    }
}

fn pullback_log_fields(s: &PullbackSignal) -> Vec<(&'static str, String)> {
    let plan = s.plan.as_ref();
    let emas = s.emas.as_ref();
    let price = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_default();
    vec![
        ("signal", s.signal.to_string()),
        ("price", format!("{:.2}", s.price)),
        ("trend", s.trend.to_string()),
        ("ema20", price(emas.map(|e| e.ema20))),
        ("ema50", price(emas.map(|e| e.ema50))),
        ("ema100", price(emas.map(|e| e.ema100))),
        ("ema200", price(emas.map(|e| e.ema200))),
        ("atr", format!("{:.2}", s.atr)),
        ("entry", price(plan.map(|p| p.entry))),
        ("stop_loss", price(plan.map(|p| p.stop_loss))),
        ("take_profit", price(plan.map(|p| p.take_profit))),
        ("reason", s.reason.to_string()),
    ]
}

/// One EMA pullback pass. Active BUY signals are loaded from and saved back
/// to `buy_signals.txt`; repeat alerts inside the cooldown are suppressed.
pub fn run_ema_pass(
    market_data: &dyn MarketDataPort,
    notifier: &dyn NotifierPort,
    tickers: &[String],
    settings: &GeneralSettings,
    gate: &mut AlertGate,
    now: DateTime<Utc>,
) -> Result<Vec<PullbackSignal>, YenesisError> {
    let active_path = settings.data_file(ACTIVE_SIGNALS_FILE);
    let mut active = csv_adapter::load_active_signals(&active_path)?;
    let mut alerted = Vec::new();

    for ticker in tickers {
        pause(settings.request_delay);
        let Some(bars) = fetch_or_skip(
            market_data,
            ticker,
            HistoryRange::Days(settings.lookback_days.max(EMA_HISTORY_DAYS)),
            Interval::Daily,
        ) else {
            continue;
        };
        let Some(signal) = ema_pullback::evaluate(ticker, &bars) else {
            tracing::debug!("{}: HOLD", ticker);
            continue;
        };
        if !gate.can_alert(ticker, now) {
            tracing::info!("{}: {} suppressed, alerted recently", ticker, signal.signal);
            continue;
        }
        if !apply_to_active(&mut active, &signal) {
            tracing::debug!("{}: SELL ignored, no active BUY", ticker);
            continue;
        }

        tracing::info!("{}: {} at {:.2}", ticker, signal.signal, signal.price);
        notify(notifier, &Notification::new(signal.subject(), signal.body()));
        csv_adapter::append_signal_log(
            &settings.alert_file(EMA_LOG),
            ticker,
            &pullback_log_fields(&signal),
            now.with_timezone(&Local).naive_local(),
        )?;
        gate.mark_alerted(ticker, now);
        alerted.push(signal);
    }

    csv_adapter::save_active_signals(&active_path, &active)?;
    Ok(alerted)
}

/// One ETF dip pass over hourly bars. Only BUY and SELL readings alert.
pub fn run_etf_pass(
    market_data: &dyn MarketDataPort,
    notifier: &dyn NotifierPort,
    tickers: &[String],
    settings: &GeneralSettings,
    gate: &mut AlertGate,
    now: DateTime<Utc>,
) -> Result<Vec<DipSignal>, YenesisError> {
    let mut alerted = Vec::new();

    for ticker in tickers {
        pause(settings.request_delay);
        let Some(bars) = fetch_or_skip(
            market_data,
            ticker,
            HistoryRange::Days(settings.lookback_days),
            Interval::Hourly,
        ) else {
            continue;
        };
        let Some(signal) = etf_dip::evaluate(ticker, &bars) else {
            tracing::debug!("{}: not enough data", ticker);
            continue;
        };
        if signal.signal == Signal::Hold {
            tracing::debug!("{}: score {}, no signal", ticker, signal.score);
            continue;
        }
        if !gate.can_alert(ticker, now) {
            tracing::info!("{}: {} suppressed, alerted recently", ticker, signal.signal);
            continue;
        }

        tracing::info!("{}: {} (score {})", ticker, signal.signal, signal.score);
        notify(notifier, &Notification::new(signal.subject(), signal.body()));
        let r = &signal.reading;
        csv_adapter::append_signal_log(
            &settings.alert_file(ETF_LOG),
            ticker,
            &[
                ("signal", signal.signal.to_string()),
                ("score", signal.score.to_string()),
                ("price", format!("{:.2}", r.price)),
                ("rsi", format!("{:.2}", r.rsi)),
                ("atr", format!("{:.2}", r.atr)),
                ("stop_loss", format!("{:.2}", signal.stop_loss())),
                ("trend", signal.trend.to_string()),
                ("reasons", signal.reasons.join("; ")),
            ],
            now.with_timezone(&Local).naive_local(),
        )?;
        gate.mark_alerted(ticker, now);
        alerted.push(signal);
    }

    Ok(alerted)
}

/// Score profiles, keep the best `top_n`, write the report and email it.
#[allow(clippy::too_many_arguments)]
pub fn run_value(
    market_data: &dyn MarketDataPort,
    notifier: &dyn NotifierPort,
    tickers: &[String],
    hard_filter: bool,
    top_n: usize,
    output: &Path,
    settings: &GeneralSettings,
    now: NaiveDateTime,
) -> Result<Vec<ValuePick>, YenesisError> {
    let mut picks = Vec::new();
    for ticker in tickers {
        pause(settings.request_delay);
        let profile = match market_data.fetch_profile(ticker) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", ticker, e);
                continue;
            }
        };
        if hard_filter && !value::passes_hard_filter(&profile) {
            tracing::debug!("{} fails the hard filter", ticker);
            continue;
        }
        match value::evaluate(&profile) {
            Some(pick) => picks.push(pick),
            None => tracing::debug!("{}: no ROE, skipped", ticker),
        }
    }

    let picks = value::top_picks(picks, top_n);
    csv_adapter::write_value_report(output, &picks, now)?;

    let listing: Vec<String> = picks
        .iter()
        .map(|p| format!("{} ({:.3})", p.ticker, p.score))
        .collect();
    let notification = Notification::new(
        "Value Stock Screener Report - Top Picks",
        format!(
            "Top {} value picks generated on {}:\n{}",
            picks.len(),
            now.format("%Y-%m-%d %H:%M:%S"),
            listing.join("\n")
        ),
    )
    .with_attachment(output);
    notify(notifier, &notification);
    Ok(picks)
}

/// Tickers whose last close is within `threshold` of the 52-week high.
pub fn run_high52(
    market_data: &dyn MarketDataPort,
    tickers: &[String],
    threshold: f64,
    output: &Path,
    settings: &GeneralSettings,
    now: NaiveDateTime,
) -> Result<Vec<NearHigh>, YenesisError> {
    let mut hits = Vec::new();
    for ticker in tickers {
        pause(settings.request_delay);
        let Some(bars) = fetch_or_skip(market_data, ticker, HistoryRange::Years(1), Interval::Daily) else {
            continue;
        };
        if let Some(hit) = high52::near_high(ticker, &bars, threshold) {
            tracing::info!(
                "{} at {:.2}, 52w high {:.2}",
                hit.ticker,
                hit.current_price,
                hit.high_52w
            );
            hits.push(hit);
        }
    }
    csv_adapter::write_high52_report(output, &hits, now)?;
    Ok(hits)
}

/// 1d/7d/30d/90d changes for each base symbol, best 90-day performers first.
pub fn run_crypto(
    market_data: &dyn MarketDataPort,
    symbols: &[String],
    settings: &GeneralSettings,
) -> Vec<CryptoMomentum> {
    let mut results = Vec::new();
    for base in symbols {
        pause(settings.request_delay);
        let symbol = crypto::quote_symbol(base);
        let Some(bars) = fetch_or_skip(
            market_data,
            &symbol,
            HistoryRange::Days(crypto::HISTORY_DAYS),
            Interval::Daily,
        ) else {
            continue;
        };
        match crypto::momentum(&symbol, &bars) {
            Some(m) => results.push(m),
            None => tracing::info!("{}: only {} bars, skipped", symbol, bars.len()),
        }
    }
    crypto::top_by_90d(results, CRYPTO_TOP)
}
