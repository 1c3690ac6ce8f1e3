use crate::price_provider::PriceFeed;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

fn default_currency() -> String {
    "GBP".to_string()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 9, 1).unwrap()
}

/// One tracked investment; price history comes from the configured feed.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Investment {
    pub ticker: String,
    pub name: String,
    pub source: PriceFeed,
    pub start_date: NaiveDate,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
}

/// Optional base-url overrides, mainly for pointing tests at mock servers.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub splitwise: Option<EndpointConfig>,
    pub exchange_rates: Option<EndpointConfig>,
    pub yahoo: Option<EndpointConfig>,
    pub eodhd: Option<EndpointConfig>,
    pub ons: Option<EndpointConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Splitwise user whose owed/paid shares make up the ledger.
    pub user_id: i64,
    pub splitwise_token: String,
    pub exchange_rates_token: String,
    #[serde(default)]
    pub eodhd_token: Option<String>,
    /// Base currency all converted amounts are expressed in.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    /// Where the ledger, rate cache and price histories are written.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Optional CSV mapping upstream category names to user subcategories.
    #[serde(default)]
    pub categories_file: Option<PathBuf>,
    #[serde(default)]
    pub investments: Vec<Investment>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "pennywise")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let proj_dirs = ProjectDirs::from("", "", "pennywise")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn expenses_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("expenses.csv"))
    }

    pub fn rate_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("exchange_rates.csv"))
    }

    pub fn prices_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("prices"))
    }

    pub fn inflation_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("inflation.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
user_id: 12345
splitwise_token: "sw-token"
exchange_rates_token: "fx-token"
investments:
  - ticker: "VWRL.L"
    name: "FTSE All-World"
    source: yahoo
    start_date: 2020-01-01
  - ticker: "VMID.L"
    name: "FTSE 250"
    source: eodhd
    start_date: 2021-06-15
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.user_id, 12345);
        assert_eq!(config.splitwise_token, "sw-token");
        // Defaults
        assert_eq!(config.currency, "GBP");
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2017, 9, 1).unwrap()
        );
        assert!(config.providers.splitwise.is_none());
        assert!(config.eodhd_token.is_none());
        assert!(config.categories_file.is_none());

        assert_eq!(config.investments.len(), 2);
        assert_eq!(config.investments[0].ticker, "VWRL.L");
        assert_eq!(config.investments[0].source, PriceFeed::Yahoo);
        assert_eq!(config.investments[1].source, PriceFeed::Eodhd);
    }

    #[test]
    fn test_config_with_overrides() {
        let yaml_str = r#"
user_id: 1
splitwise_token: "a"
exchange_rates_token: "b"
currency: "EUR"
start_date: 2019-03-01
data_dir: "/tmp/pennywise-test"
providers:
  splitwise:
    base_url: "http://example.com/splitwise"
  exchange_rates:
    base_url: "http://example.com/fx"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.currency, "EUR");
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2019, 3, 1).unwrap()
        );
        assert_eq!(
            config.providers.splitwise.as_ref().unwrap().base_url,
            "http://example.com/splitwise"
        );
        assert_eq!(
            config.providers.exchange_rates.as_ref().unwrap().base_url,
            "http://example.com/fx"
        );
        assert_eq!(
            config.rate_file().unwrap(),
            PathBuf::from("/tmp/pennywise-test/exchange_rates.csv")
        );
        assert_eq!(
            config.expenses_file().unwrap(),
            PathBuf::from("/tmp/pennywise-test/expenses.csv")
        );
    }
}
