//! CLI definition and dispatch.

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::fyers_adapter::{FyersAdapter, FyersOrder, intraday_position_id};
use crate::adapters::ibkr_adapter::IbkrAdapter;
use crate::adapters::notifier::MultiNotifier;
#[cfg(feature = "postgres")]
use crate::adapters::postgres_adapter::PostgresAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::config_validation::{
    validate_all, validate_broker, validate_fyers, validate_general, validate_market_data,
    validate_notifications,
};
use crate::domain::error::YenesisError;
use crate::domain::high52;
use crate::domain::rebalance::TradeAction;
use crate::domain::region::{Region, RegionConfig};
use crate::domain::signal::AlertGate;
use crate::domain::universe::{clean_tickers, format_market_cap};
use crate::domain::value;
use crate::jobs::database::{
    DEFAULT_KEEP_DAYS, DEFAULT_UPDATE_DAYS, format_backtest, format_stats, run_backtest,
    update_database,
};
use crate::jobs::momentum::run_momentum;
use crate::jobs::orders::{OrderSettings, run_orders};
use crate::jobs::screeners::{run_crypto, run_ema_pass, run_etf_pass, run_high52, run_value};
use crate::jobs::stoploss::run_stoploss;
use crate::jobs::{GeneralSettings, watch};
use crate::ports::broker_port::OrderSide;
use crate::ports::config_port::ConfigPort;
use crate::ports::storage_port::StoragePort;

pub const DEFAULT_ETF_CSV: &str = "usa_etf.csv";

#[derive(Parser, Debug)]
#[command(name = "yenesis", about = "Stock screening and trade automation")]
pub struct Cli {
    /// INI configuration file; without one every setting takes its default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(short, long, global = true, value_enum, default_value_t = Region::Usa)]
    pub region: Region,
    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// EMA pullback screener
    Ema {
        #[arg(long)]
        watch: bool,
    },
    /// ETF dip screener on hourly bars (USA only)
    Etf {
        #[arg(long)]
        watch: bool,
    },
    /// Momentum ranking against the region benchmark
    Momentum {
        /// Rank as of this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Value screener on fundamentals
    Value {
        #[arg(long)]
        hard_filter: bool,
        #[arg(long, default_value_t = value::DEFAULT_TOP_N)]
        top: usize,
    },
    /// Stocks near their 52-week high
    High52 {
        #[arg(long, default_value_t = high52::DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Ticker list; defaults to the region momentum universe
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Crypto momentum from a CSV with a SYMBOL column
    Crypto {
        #[arg(long)]
        csv: PathBuf,
    },
    /// EMA, ETF, momentum and value screeners in turn
    All,
    /// Rebalance the IBKR account to the momentum top list
    Orders {
        #[arg(long, value_enum)]
        action: TradeAction,
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync SuperTrend trailing stops for held positions
    Stoploss,
    /// Store recent prices and indicators for the region universe
    UpdateDb {
        #[arg(long, default_value_t = DEFAULT_UPDATE_DAYS)]
        days: u32,
        /// Ticker list; defaults to the region momentum universe
        #[arg(long)]
        tickers: Option<PathBuf>,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// SMA20/EMA50 crossover backtest on stored history
    Backtest {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Drop tickers below the region market-cap threshold
    CleanTickers {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Fyers intraday orders
    Fyers {
        #[command(subcommand)]
        action: FyersAction,
    },
    /// Validate the configuration
    Validate,
}

#[derive(Subcommand, Debug)]
pub enum DbAction {
    Init,
    Stats,
    Clean {
        #[arg(long, default_value_t = DEFAULT_KEEP_DAYS)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum FyersAction {
    /// Market intraday buy
    Buy {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 1)]
        qty: u64,
    },
    /// Exit the intraday position for a symbol
    Exit {
        #[arg(long)]
        symbol: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return report_error(&e),
    };
    let region = RegionConfig::load(cli.region, &config);
    let settings = GeneralSettings::load(&config);

    let result = match cli.command {
        Command::Ema { watch: w } => run_ema(&config, &region, &settings, w),
        Command::Etf { watch: w } => run_etf(&config, &region, &settings, w),
        Command::Momentum { as_of } => cmd_momentum(&config, &region, &settings, as_of),
        Command::Value { hard_filter, top } => cmd_value(&config, &region, &settings, hard_filter, top),
        Command::High52 { threshold, csv } => cmd_high52(&config, &region, &settings, threshold, csv),
        Command::Crypto { csv } => cmd_crypto(&config, &settings, &csv),
        Command::All => cmd_all(&config, &region, &settings),
        Command::Orders { action, dry_run } => cmd_orders(&config, &region, &settings, action, dry_run),
        Command::Stoploss => cmd_stoploss(&config),
        Command::UpdateDb { days, tickers } => cmd_update_db(&config, &region, &settings, days, tickers),
        Command::Db { action } => cmd_db(&config, action),
        Command::Backtest { symbol, start, end } => cmd_backtest(&config, &symbol, start, end),
        Command::CleanTickers {
            input,
            output,
            threshold,
        } => cmd_clean_tickers(&config, &region, &settings, &input, &output, threshold),
        Command::Fyers { action } => cmd_fyers(&config, action),
        Command::Validate => cmd_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &YenesisError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, YenesisError> {
    match path {
        Some(path) => FileConfigAdapter::from_file(path),
        None => Ok(FileConfigAdapter::empty().with_overrides(std::env::vars())),
    }
}

fn market_data(config: &dyn ConfigPort) -> Result<YahooAdapter, YenesisError> {
    validate_general(config)?;
    validate_market_data(config)?;
    YahooAdapter::from_config(config)
}

fn notifier(config: &dyn ConfigPort) -> Result<MultiNotifier, YenesisError> {
    validate_notifications(config)?;
    MultiNotifier::from_config(config)
}

fn open_storage(config: &dyn ConfigPort) -> Result<Box<dyn StoragePort>, YenesisError> {
    let backend = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    let storage: Box<dyn StoragePort> = match backend.trim().to_lowercase().as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => Box::new(SqliteAdapter::from_config(config)?),
        #[cfg(feature = "postgres")]
        "postgres" => Box::new(PostgresAdapter::from_config(config)?),
        other => {
            return Err(YenesisError::ConfigInvalid {
                section: "database".into(),
                key: "backend".into(),
                reason: format!("backend '{}' is not available in this build", other),
            });
        }
    };
    storage.initialize_schema()?;
    Ok(storage)
}

fn cooldown_gate(settings: &GeneralSettings) -> AlertGate {
    AlertGate::new(settings.signal_cooldown)
}

fn run_ema(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    watch_mode: bool,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let notifier = notifier(config)?;
    let tickers = csv_adapter::load_tickers(&settings.data_file(&region.ema_csv), &region.suffix)?;
    let mut gate = cooldown_gate(settings);

    let mut pass = || -> Result<(), YenesisError> {
        tracing::info!("Running EMA pullback screener on {} tickers", tickers.len());
        let alerts = run_ema_pass(&md, &notifier, &tickers, settings, &mut gate, Utc::now())?;
        tracing::info!("EMA pullback pass done, {} alerts", alerts.len());
        Ok(())
    };
    if watch_mode { watch(settings.check_interval, pass) } else { pass() }
}

fn run_etf(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    watch_mode: bool,
) -> Result<(), YenesisError> {
    if region.region != Region::Usa {
        tracing::warn!("ETF screener is only available for the USA region");
        return Ok(());
    }
    let md = market_data(config)?;
    let notifier = notifier(config)?;
    let etf_csv = config
        .get_string("general", "etf_csv")
        .unwrap_or_else(|| DEFAULT_ETF_CSV.to_string());
    let tickers = csv_adapter::load_tickers(&settings.data_file(&etf_csv), "")?;
    let mut gate = cooldown_gate(settings);

    let mut pass = || -> Result<(), YenesisError> {
        tracing::info!("Running ETF dip screener on {} tickers", tickers.len());
        let alerts = run_etf_pass(&md, &notifier, &tickers, settings, &mut gate, Utc::now())?;
        tracing::info!("ETF dip pass done, {} alerts", alerts.len());
        Ok(())
    };
    if watch_mode { watch(settings.check_interval, pass) } else { pass() }
}

fn cmd_momentum(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    as_of: Option<NaiveDate>,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let notifier = notifier(config)?;
    match run_momentum(&md, &notifier, region, settings, as_of, Local::now().naive_local())? {
        Some(path) => println!("Momentum report written to {}", path.display()),
        None => println!("No momentum report written"),
    }
    Ok(())
}

fn cmd_value(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    hard_filter: bool,
    top: usize,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let notifier = notifier(config)?;
    let tickers = csv_adapter::load_tickers(&settings.data_file(&region.momentum_csv), &region.suffix)?;
    let output = settings.data_file(&region.value_output);
    let picks = run_value(
        &md,
        &notifier,
        &tickers,
        hard_filter,
        top,
        &output,
        settings,
        Local::now().naive_local(),
    )?;
    for (i, p) in picks.iter().enumerate() {
        println!("{:>2}. {:<12} score {:.3}", i + 1, p.ticker, p.score);
    }
    Ok(())
}

fn cmd_high52(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    threshold: f64,
    csv: Option<PathBuf>,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let source = csv.unwrap_or_else(|| settings.data_file(&region.momentum_csv));
    let tickers = csv_adapter::load_tickers(&source, &region.suffix)?;
    let output = settings.report_file(&format!("{}_52w_high.csv", region.region));
    let hits = run_high52(&md, &tickers, threshold, &output, settings, Local::now().naive_local())?;
    for h in &hits {
        println!(
            "{:<12} {:>10.2} (52w high {:.2}, {:.1}% below)",
            h.ticker,
            h.current_price,
            h.high_52w,
            h.distance() * 100.0
        );
    }
    println!("{} stocks within {:.1}% of their 52-week high", hits.len(), threshold * 100.0);
    Ok(())
}

fn cmd_crypto(config: &dyn ConfigPort, settings: &GeneralSettings, csv: &Path) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let symbols = csv_adapter::load_column(csv, "SYMBOL")?;
    let results = run_crypto(&md, &symbols, settings);
    csv_adapter::write_crypto_report(
        &settings.report_file("crypto_momentum.csv"),
        &results,
        Local::now().naive_local(),
    )?;
    println!(
        "{:<12} {:>9} {:>9} {:>9} {:>9}",
        "Symbol", "1d %", "7d %", "30d %", "90d %"
    );
    for r in &results {
        println!(
            "{:<12} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
            r.symbol, r.change_1d, r.change_7d, r.change_30d, r.change_90d
        );
    }
    Ok(())
}

/// Each screener runs even when an earlier one fails; the first error is returned.
fn cmd_all(config: &dyn ConfigPort, region: &RegionConfig, settings: &GeneralSettings) -> Result<(), YenesisError> {
    let results = [
        run_ema(config, region, settings, false),
        run_etf(config, region, settings, false),
        cmd_momentum(config, region, settings, None),
        cmd_value(config, region, settings, false, value::DEFAULT_TOP_N),
    ];
    let mut first_err = None;
    for result in results {
        if let Err(e) = result {
            tracing::error!("Screener failed: {}", e);
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn broker(config: &dyn ConfigPort) -> Result<IbkrAdapter, YenesisError> {
    validate_broker(config)?;
    IbkrAdapter::from_config(config)
}

fn cmd_orders(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    action: TradeAction,
    dry_run: bool,
) -> Result<(), YenesisError> {
    let broker = broker(config)?;
    let notifier = notifier(config)?;
    let summary = run_orders(
        &broker,
        &notifier,
        &settings.momentum_report(region),
        OrderSettings::load(config),
        action,
        dry_run,
    )?;
    println!("{}", summary.email_body());
    Ok(())
}

fn cmd_stoploss(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    let broker = broker(config)?;
    let md = market_data(config)?;
    let notifier = notifier(config)?;
    let report = run_stoploss(&broker, &md, &notifier)?;
    println!("{}", crate::jobs::stoploss::report_body(&report));
    Ok(())
}

fn cmd_update_db(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    days: u32,
    tickers: Option<PathBuf>,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let storage = open_storage(config)?;
    let source = tickers.unwrap_or_else(|| settings.data_file(&region.momentum_csv));
    let symbols = csv_adapter::load_tickers(&source, &region.suffix)?;
    let (success, failed) = update_database(
        storage.as_ref(),
        &md,
        &symbols,
        days,
        settings.request_delay,
        Local::now().date_naive(),
    );
    println!("Database update complete. Success: {}, Failed: {}", success, failed);
    Ok(())
}

fn cmd_db(config: &dyn ConfigPort, action: DbAction) -> Result<(), YenesisError> {
    let storage = open_storage(config)?;
    match action {
        DbAction::Init => println!("Database schema ready"),
        DbAction::Stats => print!("{}", format_stats(&storage.stats()?)),
        DbAction::Clean { days } => {
            let (prices, indicators) = storage.cleanup(days, Local::now().date_naive())?;
            println!(
                "Removed {} price rows and {} indicator rows older than {} days",
                prices, indicators, days
            );
        }
    }
    Ok(())
}

fn cmd_backtest(config: &dyn ConfigPort, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<(), YenesisError> {
    if start > end {
        return Err(YenesisError::ConfigInvalid {
            section: "backtest".into(),
            key: "start".into(),
            reason: "start date must not be after end date".into(),
        });
    }
    let storage = open_storage(config)?;
    let result = run_backtest(storage.as_ref(), symbol, start, end)?;
    print!("{}", format_backtest(&result));
    Ok(())
}

fn cmd_clean_tickers(
    config: &dyn ConfigPort,
    region: &RegionConfig,
    settings: &GeneralSettings,
    input: &Path,
    output: &Path,
    threshold: Option<f64>,
) -> Result<(), YenesisError> {
    let md = market_data(config)?;
    let threshold = threshold.unwrap_or(region.marketcap_threshold);
    let tickers = csv_adapter::load_tickers(input, &region.suffix)?;
    tracing::info!(
        "Cleaning {} tickers with market cap threshold {}",
        tickers.len(),
        format_market_cap(threshold)
    );

    let result = clean_tickers(&md, &tickers, threshold, settings.request_delay);
    let kept: Vec<String> = result
        .kept
        .iter()
        .map(|t| t.strip_suffix(region.suffix.as_str()).unwrap_or(t).to_string())
        .collect();
    csv_adapter::write_tickers(output, &kept)?;
    let excluded_path = output.with_file_name("excluded_tickers.csv");
    csv_adapter::write_excluded(&excluded_path, &result.excluded)?;

    println!(
        "Kept {} tickers in {}; {} excluded (see {})",
        kept.len(),
        output.display(),
        result.excluded.len(),
        excluded_path.display()
    );
    Ok(())
}

fn cmd_fyers(config: &dyn ConfigPort, action: FyersAction) -> Result<(), YenesisError> {
    validate_fyers(config)?;
    let fyers = FyersAdapter::from_config(config)?;
    let response = match action {
        FyersAction::Buy { symbol, qty } => {
            fyers.place_order(&FyersOrder::market_intraday(&symbol, qty, OrderSide::Buy))?
        }
        FyersAction::Exit { symbol } => fyers.exit_position(&intraday_position_id(&symbol))?,
    };
    println!("{} {}", response.message, response.id.unwrap_or_default());
    Ok(())
}

fn cmd_validate(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    validate_all(config)?;
    println!("Configuration is valid");
    Ok(())
}
