//! Random alphanumeric session tokens.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::domain::SessionToken;
use crate::port::TokenGenerator;

/// Default token length.
pub const DEFAULT_TOKEN_LENGTH: usize = 16;

/// Tokens drawn uniformly from `[0-9A-Za-z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphanumericTokens {
    length: usize,
}

impl AlphanumericTokens {
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for AlphanumericTokens {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenGenerator for AlphanumericTokens {
    fn generate(&self) -> SessionToken {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        SessionToken::new(token)
    }
}
