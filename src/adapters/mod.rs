//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod email_adapter;
pub mod file_config_adapter;
pub mod fyers_adapter;
pub mod ibkr_adapter;
pub mod notifier;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
pub mod retry;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod telegram_adapter;
pub mod yahoo_adapter;
