//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Available Ports
//!
//! - [`PriceModel`] - Next price for the background simulator
//! - [`TokenGenerator`] - Fresh session tokens for the authenticator

pub mod outbound;

pub use outbound::pricing::PriceModel;
pub use outbound::token::TokenGenerator;
