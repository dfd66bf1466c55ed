//! exchange-sim - A simulated exchange.
//!
//! Accounts trade products against a stocked market counterparty while a
//! background task walks every product's price. Balances, stock, inventory
//! and price history live in SQLite, and every business operation is one
//! transaction: it either commits entirely or leaves no trace.
//!
//! # Architecture
//!
//! - **`domain`** - Plain value types: ids, users, products, price records
//! - **`port`** - Traits at the seams: [`port::PriceModel`], [`port::TokenGenerator`]
//! - **`adapter::outbound::sqlite`** - Diesel/SQLite store and its in-transaction [`Ledger`](adapter::outbound::sqlite::Ledger)
//! - **`adapter::outbound::random`** - Random walk price model and token generator
//! - **`application`** - Session, trading, price simulator and catalog seeding
//! - **`infrastructure::config`** - TOML configuration and logging
//!
//! # Example
//!
//! ```no_run
//! use exchange_sim::adapter::outbound::sqlite::{SqliteStore, StoreOptions};
//! use exchange_sim::application::{Authenticator, TradingEngine};
//!
//! fn main() -> exchange_sim::error::Result<()> {
//!     let store = SqliteStore::open("exchange.db", StoreOptions::default())?;
//!     let banana = store.add_product_with_price("Banana", 200, 1)?;
//!
//!     let auth = Authenticator::new(store.clone());
//!     let token = auth.register("admin", "secret", "Admin")?;
//!     let user = auth.resolve(&token)?;
//!
//!     let trading = TradingEngine::new(store);
//!     let receipt = trading.buy(user.id, banana.id, 2)?;
//!     assert_eq!(receipt.balance_after, 998);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
