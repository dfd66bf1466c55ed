//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. The file
//! is TOML; every section and field is optional. The database URL can be
//! overridden with `EXCHANGE_DATABASE_URL`.
//!
//! # Example
//!
//! ```no_run
//! use exchange_sim::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging()?;
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::accounts::AccountsConfig;
use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use super::simulator::SimulatorConfig;
use crate::adapter::outbound::random::AlphanumericTokens;
use crate::adapter::outbound::sqlite::{SqliteStore, StoreOptions};
use crate::application::{Authenticator, CatalogEntry};
use crate::error::{ConfigError, Result};

/// Environment variable that replaces `[database] url`.
pub const DATABASE_URL_ENV: &str = "EXCHANGE_DATABASE_URL";

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub accounts: AccountsConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Products put on the market at startup.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<CatalogEntry>,
}

fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("Banana", 1000, 120),
        CatalogEntry::new("Apple", 1000, 150),
        CatalogEntry::new("Pineapple", 100, 180),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            accounts: AccountsConfig::default(),
            simulator: SimulatorConfig::default(),
            logging: LoggingConfig::default(),
            catalog: default_catalog(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.database.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "url" }.into());
        }
        if db.retention_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retention_limit",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if db.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool_size",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let accounts = &self.accounts;
        if accounts.starting_balance < 0 {
            return Err(ConfigError::InvalidValue {
                field: "starting_balance",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        if accounts.token_length < 8 {
            return Err(ConfigError::InvalidValue {
                field: "token_length",
                reason: "must be at least 8".to_string(),
            }
            .into());
        }
        if accounts.initial_price <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_price",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.simulator.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        // Building the model checks the walk bounds.
        self.simulator.price_model()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "format",
                reason: format!("expected \"pretty\" or \"json\", got {:?}", self.logging.format),
            }
            .into());
        }

        for entry in &self.catalog {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "catalog.name" }.into());
            }
            if entry.stock < 0 {
                return Err(ConfigError::InvalidValue {
                    field: "catalog.stock",
                    reason: format!("{} has negative stock", entry.name),
                }
                .into());
            }
            if entry.price <= 0 {
                return Err(ConfigError::InvalidValue {
                    field: "catalog.price",
                    reason: format!("{} must have a positive price", entry.name),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Store settings drawn from `[database]` and `[accounts]`.
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retention_limit: self.database.retention_limit,
            starting_balance: self.accounts.starting_balance,
            initial_price: self.accounts.initial_price,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            pool_size: self.database.pool_size,
        }
    }

    #[must_use]
    pub fn token_generator(&self) -> AlphanumericTokens {
        AlphanumericTokens::new(self.accounts.token_length)
    }

    /// Authenticator over `store` issuing tokens of `[accounts] token_length`.
    #[must_use]
    pub fn authenticator(&self, store: SqliteStore) -> Authenticator {
        Authenticator::with_token_length(store, self.accounts.token_length)
    }

    /// # Errors
    /// Fails if logging was already initialized.
    pub fn init_logging(&self) -> Result<()> {
        self.logging.init()
    }
}
