//! Batch jobs behind the CLI commands.
//!
//! Each job wires domain logic to ports and is safe to drive from tests with
//! mock adapters. Per-ticker failures are logged and skipped.

pub mod database;
pub mod momentum;
pub mod orders;
pub mod screeners;
pub mod stoploss;

use crate::domain::error::YenesisError;
use crate::domain::region::RegionConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::{Notification, NotifierPort};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 250;
pub const DEFAULT_SIGNAL_COOLDOWN_SECS: i64 = 1800;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 700;

/// `[general]` settings shared by every job.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub alerts_dir: PathBuf,
    pub lookback_days: u32,
    pub signal_cooldown: chrono::Duration,
    pub check_interval: Duration,
    pub request_delay: Duration,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            reports_dir: PathBuf::from("data/reports"),
            alerts_dir: PathBuf::from("data/alerts"),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            signal_cooldown: chrono::Duration::seconds(DEFAULT_SIGNAL_COOLDOWN_SECS),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }
}

impl GeneralSettings {
    pub fn load(config: &dyn ConfigPort) -> Self {
        let d = Self::default();
        let dir = |key: &str, default: PathBuf| {
            config
                .get_string("general", key)
                .map(PathBuf::from)
                .unwrap_or(default)
        };
        Self {
            data_dir: dir("data_dir", d.data_dir),
            reports_dir: dir("reports_dir", d.reports_dir),
            alerts_dir: dir("alerts_dir", d.alerts_dir),
            lookback_days: config
                .get_int("general", "lookback_days", DEFAULT_LOOKBACK_DAYS as i64)
                .max(1) as u32,
            signal_cooldown: chrono::Duration::seconds(
                config.get_int("general", "signal_cooldown_secs", DEFAULT_SIGNAL_COOLDOWN_SECS),
            ),
            check_interval: Duration::from_secs(
                config
                    .get_int("general", "check_interval_secs", DEFAULT_CHECK_INTERVAL_SECS as i64)
                    .max(1) as u64,
            ),
            request_delay: Duration::from_millis(
                config
                    .get_int("general", "request_delay_ms", DEFAULT_REQUEST_DELAY_MS as i64)
                    .max(0) as u64,
            ),
        }
    }

    /// No delays and everything under `root`; used by tests and dry setups.
    pub fn rooted(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            reports_dir: root.join("reports"),
            alerts_dir: root.join("alerts"),
            request_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn report_file(&self, name: &str) -> PathBuf {
        self.reports_dir.join(name)
    }

    pub fn alert_file(&self, name: &str) -> PathBuf {
        self.alerts_dir.join(name)
    }

    /// The region's momentum report. Relative names resolve under
    /// `reports_dir` like every other report; absolute paths are kept.
    pub fn momentum_report(&self, region: &RegionConfig) -> PathBuf {
        self.report_file(&region.momentum_output)
    }
}

/// Politeness delay between provider requests.
pub fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Delivery failures are logged; a job never fails because a message did not go out.
pub fn notify(notifier: &dyn NotifierPort, notification: &Notification) {
    if let Err(e) = notifier.send(notification) {
        tracing::error!("Failed to send '{}': {}", notification.subject, e);
    }
}

/// Run `pass` forever, sleeping `interval` between runs.
pub fn watch<F>(interval: Duration, mut pass: F) -> Result<(), YenesisError>
where
    F: FnMut() -> Result<(), YenesisError>,
{
    loop {
        if let Err(e) = pass() {
            tracing::error!("Screening pass failed: {}", e);
        }
        tracing::info!("Sleeping for {} seconds...", interval.as_secs());
        thread::sleep(interval);
    }
}
