//! Application configuration: TOML file plus environment overrides for
//! secrets. Secrets never live in the file itself.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::execution::ExecutionConfig;
use crate::core::market_data::MarketDataConfig;
use crate::core::risk::RiskConfig;
use crate::core::settlement::SettlementConfig;
use crate::core::strategy::arbitrage::ArbitrageConfig;
use crate::error::{Error, Result};

/// Used as a `#[serde(default = "...")]` target by config structs
/// whose natural default is `true` (e.g. `ArbitrageConfig::enabled`).
pub fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Never read from the config file; populated from `WALLET_PRIVATE_KEY`.
    #[serde(skip)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConnConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_api_url() -> String {
    "https://clob.polymarket.com".to_string()
}
fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    10
}

impl Default for ExchangeConnConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            api_key: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// Per-strategy config, keyed by strategy name (`strategies.<name>.*`).
/// Only the arbitrage ("gabagool") strategy exists today; the map
/// shape leaves room for additional strategies without a config
/// schema change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategiesConfig {
    #[serde(default)]
    pub gabagool: ArbitrageConfig,
}

/// One market to subscribe on the real-time feed at startup. Token ids
/// come from exchange-side market discovery, which is out of scope
/// here; operators list the markets they want watched.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSubscription {
    pub market_id: String,
    pub condition_id: String,
    pub yes_token_id: String,
    pub no_token_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub markets: Vec<MarketSubscription>,
    #[serde(default)]
    pub exchange: ExchangeConnConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dry_run: true,
            database_url: None,
            markets: Vec::new(),
            exchange: ExchangeConnConfig::default(),
            execution: ExecutionConfig::default(),
            settlement: SettlementConfig::default(),
            market_data: MarketDataConfig::default(),
            risk: RiskConfig::default(),
            strategies: StrategiesConfig::default(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)?;
        settings.wallet.private_key = std::env::var("WALLET_PRIVATE_KEY").ok();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !self.dry_run && self.wallet.private_key.is_none() {
            return Err(Error::Config(
                "live trading requires WALLET_PRIVATE_KEY to be set".to_string(),
            ));
        }
        if self.execution.max_queue_size == 0 {
            return Err(Error::Config("execution.max_queue_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.logging.level));
        if self.logging.json {
            fmt().json().with_env_filter(filter).init();
        } else {
            fmt().with_env_filter(filter).init();
        }
    }

    #[must_use]
    pub fn max_daily_loss(&self) -> Decimal {
        self.risk.max_daily_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_default_to_dry_run() {
        let settings = Settings::default();
        assert!(settings.dry_run);
    }

    #[test]
    fn live_trading_without_private_key_fails_validation() {
        let mut settings = Settings::default();
        settings.dry_run = false;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn live_trading_with_private_key_passes_validation() {
        let mut settings = Settings::default();
        settings.dry_run = false;
        settings.wallet.private_key = Some("0xdeadbeef".to_string());
        assert!(settings.validate().is_ok());
    }
}
