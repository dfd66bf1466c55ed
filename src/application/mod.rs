//! Application services built on the store.
//!
//! - [`session`] - token issuing and resolution
//! - [`trading`] - atomic buy and sell
//! - [`simulator`] - background price ticks
//! - [`catalog`] - startup product seeding

pub mod catalog;
pub mod session;
pub mod simulator;
pub mod trading;

pub use catalog::{seed_catalog, CatalogEntry};
pub use session::Authenticator;
pub use simulator::{PriceSimulator, SimulatorSettings, SimulatorState, TickReport};
pub use trading::TradingEngine;
