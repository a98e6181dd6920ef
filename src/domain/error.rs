//! Domain error types.

/// Top-level error type for yenesis.
#[derive(Debug, thiserror::Error)]
pub enum YenesisError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("market data error for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("notification error on {channel}: {reason}")]
    Notification { channel: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl YenesisError {
    pub fn broker(reason: impl Into<String>) -> Self {
        YenesisError::Broker {
            reason: reason.into(),
        }
    }

    pub fn market_data(symbol: impl Into<String>, reason: impl ToString) -> Self {
        YenesisError::MarketData {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    /// Data was fetched but is empty or too short; the ticker should be skipped.
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            YenesisError::NoData { .. } | YenesisError::InsufficientData { .. }
        )
    }
}

impl From<&YenesisError> for std::process::ExitCode {
    fn from(err: &YenesisError) -> Self {
        let code: u8 = match err {
            YenesisError::Io(_) | YenesisError::Csv(_) => 1,
            YenesisError::ConfigParse { .. }
            | YenesisError::ConfigMissing { .. }
            | YenesisError::ConfigInvalid { .. } => 2,
            YenesisError::Database { .. } | YenesisError::DatabaseQuery { .. } => 3,
            YenesisError::NoData { .. } | YenesisError::InsufficientData { .. } => 5,
            YenesisError::MarketData { .. } => 6,
            YenesisError::Broker { .. } => 7,
            YenesisError::Notification { .. } => 8,
        };
        std::process::ExitCode::from(code)
    }
}
