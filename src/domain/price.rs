//! Price history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// One timestamped price observation.
///
/// History is ordered by `recorded_at`, ties broken by insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: ProductId,
    pub recorded_at: DateTime<Utc>,
    pub price: i64,
}

impl PriceRecord {
    pub fn new(product_id: ProductId, recorded_at: DateTime<Utc>, price: i64) -> Self {
        Self {
            product_id,
            recorded_at,
            price,
        }
    }
}
