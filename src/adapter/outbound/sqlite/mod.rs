//! SQLite persistence adapter.
//!
//! Provides the SQLite-backed exchange store using Diesel ORM.

pub mod database;
pub mod ledger;
pub mod store;

pub use ledger::Ledger;
pub use store::{SqliteStore, StoreOptions};
