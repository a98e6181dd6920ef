//! Regional market settings: ticker suffix, benchmark and file locations.

use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Region {
    Usa,
    India,
}

impl Region {
    pub fn name(&self) -> &'static str {
        match self {
            Region::Usa => "usa",
            Region::India => "india",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = YenesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usa" | "us" => Ok(Region::Usa),
            "india" | "in" => Ok(Region::India),
            other => Err(YenesisError::ConfigInvalid {
                section: "general".into(),
                key: "region".into(),
                reason: format!("unknown region '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionConfig {
    pub region: Region,
    pub suffix: String,
    pub benchmark_ticker: String,
    pub marketcap_threshold: f64,
    pub momentum_csv: String,
    pub momentum_output: String,
    pub value_output: String,
    pub ema_csv: String,
}

impl RegionConfig {
    pub fn defaults(region: Region) -> Self {
        match region {
            Region::India => Self {
                region,
                suffix: ".NS".into(),
                benchmark_ticker: "^NSEI".into(),
                marketcap_threshold: 50_000_000_000.0,
                momentum_csv: "india_stock_post_mcap_filter.csv".into(),
                momentum_output: "ind_momentum_summary.csv".into(),
                value_output: "val_india.csv".into(),
                ema_csv: "india_momentum.csv".into(),
            },
            Region::Usa => Self {
                region,
                suffix: String::new(),
                benchmark_ticker: "^GSPC".into(),
                marketcap_threshold: 1_000_000_000.0,
                momentum_csv: "usa_stock_post_mcap_filter.csv".into(),
                momentum_output: "usa_momentum_summary.csv".into(),
                value_output: "val_usa.csv".into(),
                ema_csv: "usa_momentum.csv".into(),
            },
        }
    }

    /// Built-in defaults overlaid with `[region.<name>]` keys.
    pub fn load(region: Region, config: &dyn ConfigPort) -> Self {
        let section = format!("region.{}", region.name());
        let defaults = Self::defaults(region);
        let string = |key: &str, default: String| config.get_string(&section, key).unwrap_or(default);

        Self {
            region,
            suffix: string("suffix", defaults.suffix),
            benchmark_ticker: string("benchmark_ticker", defaults.benchmark_ticker),
            marketcap_threshold: config.get_double(
                &section,
                "marketcap_threshold",
                defaults.marketcap_threshold,
            ),
            momentum_csv: string("momentum_csv", defaults.momentum_csv),
            momentum_output: string("momentum_output", defaults.momentum_output),
            value_output: string("value_output", defaults.value_output),
            ema_csv: string("ema_csv", defaults.ema_csv),
        }
    }
}
