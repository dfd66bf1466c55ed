//! Session token generation port.

use crate::domain::SessionToken;

/// Source of fresh opaque bearer tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> SessionToken;
}
