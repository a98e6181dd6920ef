//! CSV files: ticker lists in, screener reports and signal logs out.
//!
//! Reports start with a `# ... generated at` comment line and a blank line,
//! followed by a headed CSV table.

use crate::domain::crypto::CryptoMomentum;
use crate::domain::error::YenesisError;
use crate::domain::high52::NearHigh;
use crate::domain::momentum::{MomentumRecord, ROC_WINDOWS, WindowPrices};
use crate::domain::signal::ActiveSignals;
use crate::domain::stats::round_to;
use crate::domain::universe::{ExcludedTicker, normalize_tickers};
use crate::domain::value::ValuePick;
use chrono::NaiveDateTime;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const BENCHMARK_ROW: &str = "BENCHMARK";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn f3(v: f64) -> String {
    format!("{:.3}", v)
}

fn opt3(v: Option<f64>) -> String {
    v.map(f3).unwrap_or_default()
}

fn ensure_parent(path: &Path) -> Result<(), YenesisError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Create `path`, write the comment banner and hand back a CSV writer.
fn report_writer(path: &Path, banner: &str) -> Result<csv::Writer<File>, YenesisError> {
    ensure_parent(path)?;
    let mut file = File::create(path)?;
    write!(file, "# {}\n\n", banner)?;
    Ok(csv::Writer::from_writer(file))
}

fn is_header_cell(cell: &str) -> bool {
    matches!(cell.trim().to_lowercase().as_str(), "ticker" | "symbol" | "tickers")
}

/// First column of a ticker list, trimmed and deduplicated with `suffix`
/// appended. A leading `ticker`/`symbol` header row is skipped.
pub fn load_tickers(path: &Path, suffix: &str) -> Result<Vec<String>, YenesisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut raw = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let Some(cell) = record.get(0) else { continue };
        if i == 0 && is_header_cell(cell) {
            continue;
        }
        raw.push(cell.to_string());
    }

    let tickers = normalize_tickers(raw, suffix);
    tracing::info!("Loaded {} tickers from {}", tickers.len(), path.display());
    Ok(tickers)
}

/// Values of a named column (case-insensitive), blanks dropped.
pub fn load_column(path: &Path, column: &str) -> Result<Vec<String>, YenesisError> {
    let mut reader = csv::Reader::from_path(path)?;
    let index = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column))
        .ok_or_else(|| YenesisError::NoData {
            symbol: format!("column '{}' in {}", column, path.display()),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        if let Some(v) = record?.get(index).map(str::trim).filter(|v| !v.is_empty()) {
            values.push(v.to_string());
        }
    }
    Ok(values)
}

/// Headerless one-ticker-per-line file, the same shape `load_tickers` reads.
pub fn write_tickers(path: &Path, tickers: &[String]) -> Result<(), YenesisError> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for t in tickers {
        writer.write_record([t])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_excluded(path: &Path, excluded: &[ExcludedTicker]) -> Result<(), YenesisError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ticker", "reason"])?;
    for e in excluded {
        writer.write_record([&e.ticker, &e.reason])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_invalid_tickers(path: &Path, tickers: &[String]) -> Result<(), YenesisError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["invalid_ticker"])?;
    for t in tickers {
        writer.write_record([t])?;
    }
    writer.flush()?;
    Ok(())
}

fn momentum_header() -> Vec<String> {
    let mut header = vec![
        "ticker".to_string(),
        "market_cap".to_string(),
        "momentum_score".to_string(),
    ];
    for w in ROC_WINDOWS {
        for field in ["start_date", "end_date", "start_price", "end_price", "roc", "z"] {
            header.push(format!("{}_{}", w, field));
        }
    }
    header
}

/// Prices are rounded to 2 decimals, ROC to 4 and z to 2 before the `%.3f`
/// formatting, so the report shows `1.230` for a z of 1.2349.
fn window_cells(prices: Option<&WindowPrices>, roc: Option<f64>, z: Option<f64>) -> [String; 6] {
    let roc = opt3(roc.map(|r| round_to(r, 4)));
    let z = opt3(z.map(|z| round_to(z, 2)));
    match prices {
        Some(p) => [
            p.start_date.to_string(),
            p.end_date.to_string(),
            f3(round_to(p.start_price, 2)),
            f3(round_to(p.end_price, 2)),
            roc,
            z,
        ],
        None => [String::new(), String::new(), String::new(), String::new(), roc, z],
    }
}

/// Benchmark row first, then ranked records.
pub fn write_momentum_report(
    path: &Path,
    benchmark: &[(usize, Option<WindowPrices>, Option<f64>)],
    records: &[MomentumRecord],
    generated_at: NaiveDateTime,
) -> Result<(), YenesisError> {
    let banner = format!("Generated at {}", generated_at.format(TIMESTAMP_FORMAT));
    let mut writer = report_writer(path, &banner)?;
    writer.write_record(momentum_header())?;

    let mut row = vec![BENCHMARK_ROW.to_string(), String::new(), String::new()];
    for w in ROC_WINDOWS {
        let entry = benchmark.iter().find(|(bw, _, _)| *bw == w);
        let prices = entry.and_then(|(_, p, _)| p.as_ref());
        let roc = entry.and_then(|(_, _, r)| *r);
        row.extend(window_cells(prices, roc, None));
    }
    writer.write_record(&row)?;

    for record in records {
        let mut row = vec![
            record.ticker.clone(),
            f3(record.market_cap),
            f3(round_to(record.momentum_score, 2)),
        ];
        for w in ROC_WINDOWS {
            match record.window(w) {
                Some(s) => row.extend(window_cells(s.prices.as_ref(), Some(s.stock_roc), Some(s.z))),
                None => row.extend(window_cells(None, None, None)),
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    tracing::info!("CSV file saved: {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumRow {
    pub ticker: String,
    pub momentum_score: f64,
}

/// Stock rows of a momentum report; comment lines and the benchmark row are
/// skipped, as are rows without a numeric score.
pub fn read_momentum_report(path: &Path) -> Result<Vec<MomentumRow>, YenesisError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(ticker_idx), Some(score_idx)) = (col("ticker"), col("momentum_score")) else {
        return Err(YenesisError::NoData {
            symbol: format!("momentum columns in {}", path.display()),
        });
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let ticker = record.get(ticker_idx).unwrap_or_default().trim();
        if ticker.is_empty() || ticker == BENCHMARK_ROW {
            continue;
        }
        if let Some(score) = record.get(score_idx).and_then(|s| s.trim().parse::<f64>().ok()) {
            rows.push(MomentumRow {
                ticker: ticker.to_string(),
                momentum_score: score,
            });
        }
    }
    Ok(rows)
}

/// Best `n` tickers of a momentum report by score.
pub fn top_momentum_tickers(path: &Path, n: usize) -> Result<Vec<String>, YenesisError> {
    let mut rows = read_momentum_report(path)?;
    rows.sort_by(|a, b| b.momentum_score.total_cmp(&a.momentum_score));
    Ok(rows.into_iter().take(n).map(|r| r.ticker).collect())
}

pub fn write_value_report(path: &Path, picks: &[ValuePick], generated_at: NaiveDateTime) -> Result<(), YenesisError> {
    let banner = format!("Generated at {}", generated_at.format(TIMESTAMP_FORMAT));
    let mut writer = report_writer(path, &banner)?;
    writer.write_record([
        "ticker",
        "name",
        "description",
        "pe",
        "forward_pe",
        "pb",
        "roe",
        "roa",
        "gross_margin",
        "profit_margin",
        "current_ratio",
        "debt_to_equity",
        "eps_growth",
        "revenue_growth",
        "free_cash_flow",
        "dividend_yield",
        "insider_holding",
        "score",
    ])?;
    for p in picks {
        let mut row = vec![
            p.ticker.clone(),
            p.name.clone().unwrap_or_default(),
            p.description.clone().unwrap_or_default(),
        ];
        row.extend(
            [
                p.pe,
                p.forward_pe,
                p.pb,
                p.roe,
                p.roa,
                p.gross_margin,
                p.profit_margin,
                p.current_ratio,
                p.debt_to_equity,
                p.eps_growth,
                p.revenue_growth,
                p.free_cash_flow,
                p.dividend_yield,
                p.insider_holding,
                p.score,
            ]
            .into_iter()
            .map(f3),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    tracing::info!("Saved top value picks to {}", path.display());
    Ok(())
}

pub fn write_high52_report(path: &Path, hits: &[NearHigh], generated_at: NaiveDateTime) -> Result<(), YenesisError> {
    let banner = format!(
        "52-Week High Report generated at {}",
        generated_at.format(TIMESTAMP_FORMAT)
    );
    let mut writer = report_writer(path, &banner)?;
    writer.write_record(["ticker", "current_price", "52w_high"])?;
    for h in hits {
        writer.write_record([h.ticker.clone(), f3(h.current_price), f3(h.high_52w)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_crypto_report(
    path: &Path,
    results: &[CryptoMomentum],
    generated_at: NaiveDateTime,
) -> Result<(), YenesisError> {
    let banner = format!(
        "Crypto Momentum Report generated at {}",
        generated_at.format(TIMESTAMP_FORMAT)
    );
    let mut writer = report_writer(path, &banner)?;
    writer.write_record(["symbol", "1d_change", "7d_change", "30d_change", "90d_change"])?;
    for r in results {
        writer.write_record([
            r.symbol.clone(),
            f3(r.change_1d),
            f3(r.change_7d),
            f3(r.change_30d),
            f3(r.change_90d),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Append one row to a signal log, writing the header when the file is new.
pub fn append_signal_log(
    path: &Path,
    ticker: &str,
    fields: &[(&str, String)],
    logged_at: NaiveDateTime,
) -> Result<(), YenesisError> {
    ensure_parent(path)?;
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);

    if is_new {
        let mut header = vec!["datetime", "ticker"];
        header.extend(fields.iter().map(|(k, _)| *k));
        writer.write_record(&header)?;
    }
    let mut row = vec![logged_at.format(TIMESTAMP_FORMAT).to_string(), ticker.to_string()];
    row.extend(fields.iter().map(|(_, v)| v.clone()));
    writer.write_record(&row)?;
    writer.flush()?;
    Ok(())
}

/// Missing file means no active signals.
pub fn load_active_signals(path: &Path) -> Result<ActiveSignals, YenesisError> {
    if !path.exists() {
        return Ok(ActiveSignals::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(ActiveSignals::from_lines(content.lines()))
}

pub fn save_active_signals(path: &Path, signals: &ActiveSignals) -> Result<(), YenesisError> {
    ensure_parent(path)?;
    let mut file = File::create(path)?;
    for ticker in signals.iter() {
        writeln!(file, "{}", ticker)?;
    }
    Ok(())
}
