use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gateway::Currency;

/// Fiat currency used when neither CLI flag nor config names one.
pub const DEFAULT_CURRENCY: Currency = Currency::Usd;

/// File name used in the XDG config directory.
pub const CONFIG_FILE_NAME: &str = "cointrack.toml";

/// Application configuration loaded from `$XDG_CONFIG_HOME/cointrack.toml`
/// or `~/.config/cointrack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: DefaultsConfig,
    pub coingecko: CoinGeckoConfig,
    pub storage: StorageConfig,
}

/// General defaults used when CLI flags are not provided.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub currency: Option<String>,
}

/// CoinGecko provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub api_key: Option<String>,
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

impl DefaultsConfig {
    /// Parse the configured currency code, if any.
    pub fn parsed_currency(&self) -> Result<Option<Currency>> {
        match self.currency.as_deref() {
            None => Ok(None),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "usd" => Ok(Some(Currency::Usd)),
                "eur" => Ok(Some(Currency::Eur)),
                other => Err(Error::Config(format!(
                    "unknown currency '{}' in [defaults].currency -- expected usd or eur",
                    other
                ))),
            },
        }
    }
}

/// Resolve the configuration file path based on XDG conventions.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config_home.trim().is_empty()
    {
        return Some(PathBuf::from(xdg_config_home).join(CONFIG_FILE_NAME));
    }

    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config").join(CONFIG_FILE_NAME))
}

/// Load config from disk. Returns defaults when the file does not exist.
pub fn load() -> Result<AppConfig> {
    let Some(path) = config_path() else {
        return Ok(AppConfig::default());
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(err) => {
            return Err(read_config_error(&path, err));
        }
    };

    parse(&raw).map_err(|err| parse_config_error(&path, err))
}

/// Load config from an explicit path.
///
/// Unlike [`load`], this returns an error when the file is missing.
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path).map_err(|err| read_config_error(path, err))?;
    parse(&raw).map_err(|err| parse_config_error(path, err))
}

fn parse(raw: &str) -> std::result::Result<AppConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn read_config_error(path: &Path, err: std::io::Error) -> Error {
    Error::Config(format!(
        "failed to read config file '{}': {}",
        path.display(),
        err
    ))
}

fn parse_config_error(path: &Path, err: toml::de::Error) -> Error {
    Error::Config(format!(
        "failed to parse config file '{}': {}",
        path.display(),
        err
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let cfg = parse("").unwrap();
        assert!(cfg.defaults.currency.is_none());
        assert!(cfg.coingecko.api_key.is_none());
        assert!(cfg.storage.path.is_none());
    }

    #[test]
    fn parse_coingecko_api_key() {
        let cfg = parse(
            r#"
            [coingecko]
            api_key = "abc123"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.coingecko.api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn parse_default_currency() {
        let cfg = parse(
            r#"
            [defaults]
            currency = "eur"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.defaults.currency.as_deref(), Some("eur"));
        assert_eq!(cfg.defaults.parsed_currency().unwrap(), Some(Currency::Eur));
    }

    #[test]
    fn parse_rejects_unknown_currency() {
        let cfg = parse(
            r#"
            [defaults]
            currency = "gbp"
            "#,
        )
        .unwrap();

        let err = cfg.defaults.parsed_currency().unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("gbp")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_storage_path() {
        let cfg = parse(
            r#"
            [storage]
            path = "/tmp/coins.db"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.storage.path.as_deref(), Some(Path::new("/tmp/coins.db")));
    }
}
