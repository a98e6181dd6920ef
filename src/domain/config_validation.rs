//! Configuration validation.
//!
//! Runs before any command that talks to the network so a bad INI fails fast
//! with the offending section and key.

use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> YenesisError {
    YenesisError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, YenesisError> {
    config
        .get_string(section, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| YenesisError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Email is on when explicitly enabled, or by default once a host is set.
pub fn email_enabled(config: &dyn ConfigPort) -> bool {
    let has_host = config.get_string("email", "smtp_host").is_some();
    config.get_bool("email", "enabled", has_host)
}

/// Telegram is on when explicitly enabled, or by default once a token is set.
pub fn telegram_enabled(config: &dyn ConfigPort) -> bool {
    let has_token = config.get_string("telegram", "bot_token").is_some();
    config.get_bool("telegram", "enabled", has_token)
}

pub fn validate_general(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    for key in ["lookback_days", "signal_cooldown_secs", "check_interval_secs"] {
        if config.get_int("general", key, 1) <= 0 {
            return Err(invalid("general", key, "must be positive"));
        }
    }
    if config.get_int("general", "request_delay_ms", 0) < 0 {
        return Err(invalid("general", "request_delay_ms", "must be non-negative"));
    }
    Ok(())
}

pub fn validate_market_data(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    if config.get_int("market_data", "retries", 3) < 1 {
        return Err(invalid("market_data", "retries", "at least one attempt is required"));
    }
    if config.get_double("market_data", "backoff_secs", 1.0) < 0.0 {
        return Err(invalid("market_data", "backoff_secs", "must be non-negative"));
    }
    if config.get_int("market_data", "timeout_secs", 30) <= 0 {
        return Err(invalid("market_data", "timeout_secs", "must be positive"));
    }
    Ok(())
}

pub fn validate_broker(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    if config.get_string("ibkr", "base_urls").is_some() && config.get_list("ibkr", "base_urls").is_empty() {
        return Err(invalid("ibkr", "base_urls", "at least one base URL is required"));
    }
    if config.get_double("ibkr", "cash_reserve", 10.0) < 0.0 {
        return Err(invalid("ibkr", "cash_reserve", "must be non-negative"));
    }
    if config.get_int("ibkr", "top_n", 20) < 1 {
        return Err(invalid("ibkr", "top_n", "must be at least 1"));
    }
    if config.get_int("ibkr", "price_retries", 3) < 1 {
        return Err(invalid("ibkr", "price_retries", "must be at least 1"));
    }
    Ok(())
}

pub fn validate_notifications(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    if email_enabled(config) {
        require(config, "email", "smtp_host")?;
        require(config, "email", "sender")?;
        if config.get_list("email", "recipients").is_empty() {
            return Err(YenesisError::ConfigMissing {
                section: "email".into(),
                key: "recipients".into(),
            });
        }
        let port = config.get_int("email", "smtp_port", 587);
        if !(1..=65535).contains(&port) {
            return Err(invalid("email", "smtp_port", "must be a valid TCP port"));
        }
    }
    if telegram_enabled(config) {
        require(config, "telegram", "bot_token")?;
        require(config, "telegram", "chat_id")?;
    }
    Ok(())
}

pub fn validate_fyers(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    require(config, "fyers", "client_id")?;
    require(config, "fyers", "access_token")?;
    Ok(())
}

/// Everything except the Fyers credentials, which only the `fyers` command needs.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), YenesisError> {
    validate_general(config)?;
    validate_market_data(config)?;
    validate_broker(config)?;
    validate_notifications(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_passes() {
        assert!(validate_all(&FileConfigAdapter::empty()).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[general]
lookback_days = 250
[market_data]
retries = 3
backoff_secs = 1
[ibkr]
base_urls = https://localhost:5001/v1/api, https://localhost:5000/v1/api
top_n = 20
[email]
smtp_host = smtp.gmail.com
sender = bot@example.com
recipients = a@example.com, b@example.com
[telegram]
bot_token = 123:abc
chat_id = 42
"#,
        );
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn zero_retries_fails() {
        let config = make_config("[market_data]\nretries = 0\n");
        let err = validate_all(&config).unwrap_err();
        assert!(matches!(err, YenesisError::ConfigInvalid { key, .. } if key == "retries"));
    }

    #[test]
    fn blank_base_urls_fails() {
        let config = make_config("[ibkr]\nbase_urls = ,\n");
        let err = validate_broker(&config).unwrap_err();
        assert!(matches!(err, YenesisError::ConfigInvalid { key, .. } if key == "base_urls"));
    }

    #[test]
    fn email_host_without_recipients_fails() {
        let config = make_config("[email]\nsmtp_host = smtp.example.com\nsender = me@example.com\n");
        let err = validate_notifications(&config).unwrap_err();
        assert!(matches!(err, YenesisError::ConfigMissing { key, .. } if key == "recipients"));
    }

    #[test]
    fn disabled_email_is_not_checked() {
        let config = make_config("[email]\nsmtp_host = smtp.example.com\nenabled = false\n");
        assert!(validate_notifications(&config).is_ok());
        assert!(!email_enabled(&config));
    }

    #[test]
    fn telegram_needs_chat_id() {
        let config = make_config("[telegram]\nbot_token = 1:x\n");
        let err = validate_notifications(&config).unwrap_err();
        assert!(matches!(err, YenesisError::ConfigMissing { section, key } if section == "telegram" && key == "chat_id"));
    }

    #[test]
    fn fyers_credentials_required() {
        let config = make_config("[fyers]\nclient_id = ABC-100\n");
        let err = validate_fyers(&config).unwrap_err();
        assert!(matches!(err, YenesisError::ConfigMissing { key, .. } if key == "access_token"));
    }
}
