//! New-account and new-product defaults.

use serde::Deserialize;

use crate::adapter::outbound::random::DEFAULT_TOKEN_LENGTH;

/// `[accounts]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// Balance credited on registration.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// Seed price for products added without one.
    #[serde(default = "default_initial_price")]
    pub initial_price: i64,
}

const fn default_starting_balance() -> i64 {
    1000
}

const fn default_token_length() -> usize {
    DEFAULT_TOKEN_LENGTH
}

const fn default_initial_price() -> i64 {
    100
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            token_length: default_token_length(),
            initial_price: default_initial_price(),
        }
    }
}
