//! Products, market stock and per-user inventory.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, UserId};

/// A tradable product. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Units of a product available from the market counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub product: Product,
    /// Always `>= 0`.
    pub stock: i64,
}

/// Units of a product owned by one user.
///
/// Rows only exist for strictly positive counts; absence means zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub count: i64,
}
