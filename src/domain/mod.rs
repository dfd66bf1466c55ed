//! Storage-agnostic domain types.

pub mod account;
pub mod id;
pub mod market;
pub mod price;
pub mod trade;

pub use account::{Holdings, User};
pub use id::{AccountId, ProductId, SessionToken, UserId};
pub use market::{InventoryEntry, MarketEntry, Product};
pub use price::PriceRecord;
pub use trade::{Side, TradeReceipt};
