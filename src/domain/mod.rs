//! Core domain types and logic: indicators, screeners and trading rules.

pub mod backtest;
pub mod config_validation;
pub mod crypto;
pub mod ema_pullback;
pub mod error;
pub mod etf_dip;
pub mod high52;
pub mod indicator;
pub mod momentum;
pub mod ohlcv;
pub mod rebalance;
pub mod region;
pub mod signal;
pub mod snapshot;
pub mod stats;
pub mod stoploss;
pub mod universe;
pub mod value;
