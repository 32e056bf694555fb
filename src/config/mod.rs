use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::currency::{rates::DEFAULT_FALLBACK_DAYS, Currency, RateBook};
use crate::errors::{LedgerError, Result};
use crate::utils::{persistence::write_atomic, DEFAULT_LOG_FILTER};

const APP_DIR: &str = "ledger_core";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_SPAWN_HORIZON_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub native_currency: String,
    /// Days an exchange rate stays usable when no newer one is published.
    pub rate_fallback_days: i64,
    /// How far ahead schedules are expanded for upcoming views.
    pub spawn_horizon_days: i64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            native_currency: "USD".into(),
            rate_fallback_days: DEFAULT_FALLBACK_DAYS,
            spawn_horizon_days: DEFAULT_SPAWN_HORIZON_DAYS,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl Config {
    pub fn native(&self) -> Currency {
        Currency::new(&self.native_currency)
    }

    /// Empty rate table using the configured fallback window.
    pub fn rate_book(&self) -> RateBook {
        RateBook::with_fallback_days(self.rate_fallback_days)
    }

    pub fn validate(&self) -> Result<()> {
        let code = self.native_currency.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidInput(format!(
                "`{}` is not a currency code",
                self.native_currency
            )));
        }
        if self.rate_fallback_days < 0 || self.spawn_horizon_days < 0 {
            return Err(LedgerError::InvalidInput(
                "day counts must not be negative".into(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Manager for `<config dir>/ledger_core/config.json`.
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            LedgerError::InvalidInput("no configuration directory on this platform".into())
        })?;
        Ok(Self::with_path(base.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the configuration, falling back to defaults when no file exists.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.json"));
        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));
        let config = Config {
            native_currency: "CAD".into(),
            rate_fallback_days: 7,
            ..Config::default()
        };
        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.native(), Currency::new("CAD"));
        assert_eq!(loaded.rate_book().fallback_days, 7);
        assert!(!dir.path().join("nested").join("config.json.tmp").exists());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "native_currency": "EUR" }"#).unwrap();
        let config = ConfigManager::with_path(path).load().unwrap();
        assert_eq!(config.native_currency, "EUR");
        assert_eq!(config.spawn_horizon_days, DEFAULT_SPAWN_HORIZON_DAYS);
    }

    #[test]
    fn invalid_currency_is_rejected() {
        let config = Config {
            native_currency: "dollars".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
