//! Users and their holdings.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, UserId};
use super::market::InventoryEntry;

/// The trading side of an account: display name and cash balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Cash in whole currency units. Never negative once persisted.
    pub balance: i64,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, balance: i64) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
        }
    }
}

/// A user together with every product they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    pub user: User,
    pub inventory: Vec<InventoryEntry>,
}

impl Holdings {
    /// Units of `product` held; zero when the product is absent.
    #[must_use]
    pub fn count_of(&self, product: ProductId) -> i64 {
        self.inventory
            .iter()
            .find(|e| e.product_id == product)
            .map_or(0, |e| e.count)
    }
}
