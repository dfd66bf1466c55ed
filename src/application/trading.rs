//! Buying from and selling to the market.
//!
//! Every trade runs as one immediate transaction: the price read, the funds
//! and stock checks and all three writes commit together or not at all.
//! Since writers are serialized, the price a trade is valued at is both the
//! price when it started and the price when it committed.

use tracing::debug;

use crate::adapter::outbound::sqlite::{Ledger, SqliteStore};
use crate::domain::{ProductId, Side, TradeReceipt, UserId};
use crate::error::{ExchangeError, Result};

/// Executes trades against the market counterparty.
#[derive(Debug, Clone)]
pub struct TradingEngine {
    store: SqliteStore,
}

impl TradingEngine {
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Buy `amount` units of `product` at its latest price.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0`
    /// - `NotEnoughMoney` if the user cannot pay
    /// - `OutOfStock` if the market holds fewer than `amount` units
    ///
    /// None of these change any state. Busy errors are returned as-is.
    pub fn buy(&self, user: UserId, product: ProductId, amount: i64) -> Result<TradeReceipt> {
        check_amount(amount)?;
        let receipt = self.store.transaction(|l| buy_in(l, user, product, amount))?;
        debug!(
            user = %user,
            product = %product,
            amount,
            unit_price = receipt.unit_price,
            balance = receipt.balance_after,
            "Bought"
        );
        Ok(receipt)
    }

    /// Sell `amount` units of `product` back to the market at its latest price.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0`
    /// - `NotInInventory` if the user holds fewer than `amount` units
    pub fn sell(&self, user: UserId, product: ProductId, amount: i64) -> Result<TradeReceipt> {
        check_amount(amount)?;
        let receipt = self.store.transaction(|l| sell_in(l, user, product, amount))?;
        debug!(
            user = %user,
            product = %product,
            amount,
            unit_price = receipt.unit_price,
            balance = receipt.balance_after,
            "Sold"
        );
        Ok(receipt)
    }
}

fn check_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(ExchangeError::InvalidAmount { amount }.into());
    }
    Ok(())
}

fn buy_in(l: &mut Ledger<'_>, user: UserId, product: ProductId, amount: i64) -> Result<TradeReceipt> {
    let buyer = l.user(user)?;
    let unit_price = l.latest_price(product)?;
    let total = unit_price
        .checked_mul(amount)
        .ok_or(ExchangeError::NotEnoughMoney {
            required: i64::MAX,
            available: buyer.balance,
        })?;
    if buyer.balance < total {
        return Err(ExchangeError::NotEnoughMoney {
            required: total,
            available: buyer.balance,
        }
        .into());
    }

    l.adjust_market_stock(product, -amount)?;
    l.adjust_inventory(user, product, amount)?;
    let balance_after = l.adjust_balance(user, -total)?;

    Ok(TradeReceipt {
        user_id: user,
        product_id: product,
        side: Side::Buy,
        amount,
        unit_price,
        total,
        balance_after,
    })
}

fn sell_in(l: &mut Ledger<'_>, user: UserId, product: ProductId, amount: i64) -> Result<TradeReceipt> {
    l.user(user)?;
    let unit_price = l.latest_price(product)?;
    let total = unit_price
        .checked_mul(amount)
        .ok_or(ExchangeError::InvalidAmount { amount })?;

    l.adjust_inventory(user, product, -amount)?;
    l.adjust_market_stock(product, amount)?;
    let balance_after = l.adjust_balance(user, total)?;

    Ok(TradeReceipt {
        user_id: user,
        product_id: product,
        side: Side::Sell,
        amount,
        unit_price,
        total,
        balance_after,
    })
}
