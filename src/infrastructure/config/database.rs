//! Store location and connection settings.

use serde::Deserialize;

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, or `:memory:`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Price records kept per product.
    #[serde(default = "default_retention_limit")]
    pub retention_limit: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_url() -> String {
    "exchange.db".to_string()
}

const fn default_retention_limit() -> u32 {
    3600
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

const fn default_pool_size() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            retention_limit: default_retention_limit(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}
