//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the randomness the core depends on: price
//! evolution and token issuance.

pub mod pricing;
pub mod token;
