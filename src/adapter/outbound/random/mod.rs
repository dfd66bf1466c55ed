//! Randomness adapters: the price walk and token generation.

pub mod token;
pub mod walk;

pub use token::{AlphanumericTokens, DEFAULT_TOKEN_LENGTH};
pub use walk::{RandomWalk, WalkParams};
