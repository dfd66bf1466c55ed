//! Configuration sections and logging setup.

pub mod accounts;
pub mod database;
pub mod logging;
pub mod settings;
pub mod simulator;

pub use settings::Config;
