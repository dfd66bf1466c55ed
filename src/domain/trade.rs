//! Trade outcome types.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, UserId};

/// Direction of a trade, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// What a committed trade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub side: Side,
    pub amount: i64,
    /// Price per unit the trade was valued at.
    pub unit_price: i64,
    pub total: i64,
    pub balance_after: i64,
}
