//! Seeding the market with an initial product catalog.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapter::outbound::sqlite::SqliteStore;
use crate::domain::Product;
use crate::error::Result;

/// One product to put on the market at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    /// Units added to the market.
    pub stock: i64,
    /// Seed price, used only when the product is new.
    pub price: i64,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, stock: i64, price: i64) -> Self {
        Self {
            name: name.into(),
            stock,
            price,
        }
    }
}

/// Add every entry to the market.
///
/// New products are created with their seed price; products that already
/// exist are only restocked, so seeding the same database twice doubles the
/// stock but leaves price history alone. All entries commit together.
///
/// # Errors
/// Any store error; nothing is seeded in that case.
pub fn seed_catalog(store: &SqliteStore, entries: &[CatalogEntry]) -> Result<Vec<Product>> {
    let products = store.transaction(|l| {
        entries
            .iter()
            .map(|e| l.add_product(&e.name, e.stock, e.price))
            .collect::<Result<Vec<_>>>()
    })?;
    info!(products = products.len(), "Seeded catalog");
    Ok(products)
}
