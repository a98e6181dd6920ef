//! INI file configuration adapter with environment overrides.
//!
//! `YENESIS_<SECTION>_<KEY>` takes precedence over the file, so secrets such as
//! the SMTP password or the Telegram bot token never need to live on disk.

use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::collections::HashMap;
use std::path::Path;

pub const ENV_PREFIX: &str = "YENESIS_";

pub struct FileConfigAdapter {
    config: Ini,
    overrides: HashMap<String, String>,
}

impl FileConfigAdapter {
    /// Load an INI file and pick up `YENESIS_*` variables from the process environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, YenesisError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| YenesisError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self {
            config,
            overrides: HashMap::new(),
        }
        .with_overrides(std::env::vars()))
    }

    /// Parse INI text. No environment overrides are applied.
    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self {
            config,
            overrides: HashMap::new(),
        })
    }

    /// An empty configuration; every lookup falls back to its default.
    pub fn empty() -> Self {
        Self {
            config: Ini::new(),
            overrides: HashMap::new(),
        }
    }

    /// Register overrides from `(NAME, value)` pairs. Names without the
    /// `YENESIS_` prefix are ignored.
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(rest) = name.strip_prefix(ENV_PREFIX) {
                self.overrides.insert(rest.to_uppercase(), value);
            }
        }
        self
    }

    fn env_key(section: &str, key: &str) -> String {
        format!("{}_{}", section, key)
            .to_uppercase()
            .replace(['.', '-'], "_")
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.overrides
            .get(&Self::env_key(section, key))
            .cloned()
            .or_else(|| self.config.get(section, key))
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[ibkr]
base_urls = https://localhost:5001/v1/api, https://localhost:5000/v1/api
cash_reserve = 10

[email]
smtp_host = smtp.gmail.com
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("email", "smtp_host"),
            Some("smtp.gmail.com".to_string())
        );
        assert_eq!(adapter.get_double("ibkr", "cash_reserve", 0.0), 10.0);
        assert_eq!(
            adapter.get_list("ibkr", "base_urls"),
            vec![
                "https://localhost:5001/v1/api".to_string(),
                "https://localhost:5000/v1/api".to_string()
            ]
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[general]\nlookback_days = 250\n").unwrap();
        assert_eq!(adapter.get_string("general", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[general]\nlookback_days = abc\n").unwrap();
        assert_eq!(adapter.get_int("general", "lookback_days", 250), 250);
    }

    #[test]
    fn get_bool_variants() {
        let adapter =
            FileConfigAdapter::from_string("[email]\na = true\nb = no\nc = 1\nd = maybe\n")
                .unwrap();
        assert!(adapter.get_bool("email", "a", false));
        assert!(!adapter.get_bool("email", "b", true));
        assert!(adapter.get_bool("email", "c", false));
        assert!(adapter.get_bool("email", "d", true));
        assert!(!adapter.get_bool("email", "missing", false));
    }

    #[test]
    fn get_list_missing_is_empty() {
        let adapter = FileConfigAdapter::empty();
        assert!(adapter.get_list("email", "recipients").is_empty());
    }

    #[test]
    fn environment_overrides_file_values() {
        let adapter = FileConfigAdapter::from_string("[telegram]\nbot_token = from-file\n")
            .unwrap()
            .with_overrides(vec![
                ("YENESIS_TELEGRAM_BOT_TOKEN".to_string(), "from-env".to_string()),
                ("YENESIS_REGION_INDIA_SUFFIX".to_string(), ".BO".to_string()),
                ("UNRELATED_VAR".to_string(), "x".to_string()),
            ]);
        assert_eq!(
            adapter.get_string("telegram", "bot_token"),
            Some("from-env".to_string())
        );
        assert_eq!(
            adapter.get_string("region.india", "suffix"),
            Some(".BO".to_string())
        );
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /tmp/yenesis.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/tmp/yenesis.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(YenesisError::ConfigParse { .. })));
    }
}
