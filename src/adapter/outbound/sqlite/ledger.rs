//! Statements that run inside one store transaction.
//!
//! A [`Ledger`] borrows a connection that is already inside a transaction.
//! Composite operations (register, buy, sell, a price tick) call several
//! ledger methods in sequence; the enclosing transaction makes the sequence
//! atomic. Any `Err` returned from the closure rolls every statement back.

use chrono::{DateTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::OptionalExtension;
use diesel::SqliteConnection;
use tracing::trace;

use super::database::model::{
    AccountRow, InventoryRow, MarketRow, NewAccountRow, NewPriceRecordRow, NewProductRow,
    PriceRecordRow, ProductRow, UserRow,
};
use super::database::schema::{accounts, inventory, marketplace, price_records, products, users};
use super::store::StoreOptions;
use crate::domain::{
    AccountId, Holdings, InventoryEntry, MarketEntry, PriceRecord, Product, ProductId,
    SessionToken, User, UserId,
};
use crate::error::{Error, ExchangeError, Result};

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    #[diesel(column_name = "id")]
    id: i64,
}

/// Transaction-scoped view of the store.
pub struct Ledger<'a> {
    conn: &'a mut SqliteConnection,
    options: &'a StoreOptions,
}

impl<'a> Ledger<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection, options: &'a StoreOptions) -> Self {
        Self { conn, options }
    }

    /// Options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        self.options
    }

    fn last_insert_rowid(&mut self) -> Result<i64> {
        let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid() AS id")
            .get_result(&mut *self.conn)?;
        Ok(row.id)
    }

    // -------------------------------------------------------------------------
    // Accounts and users
    // -------------------------------------------------------------------------

    /// Create an account and its user with the configured starting balance.
    pub fn register_account(
        &mut self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AccountId> {
        if self.account_id(username)?.is_some() {
            return Err(ExchangeError::AccountAlreadyExists {
                username: username.to_string(),
            }
            .into());
        }

        diesel::insert_into(accounts::table)
            .values(&NewAccountRow { username, password })
            .execute(&mut *self.conn)?;
        let id = self.last_insert_rowid()?;

        diesel::insert_into(users::table)
            .values(&UserRow {
                id,
                name: display_name.to_string(),
                balance: self.options.starting_balance,
            })
            .execute(&mut *self.conn)?;

        Ok(AccountId::new(id))
    }

    /// Look up an account id by username.
    pub fn account_id(&mut self, username: &str) -> Result<Option<AccountId>> {
        let id: Option<i64> = accounts::table
            .filter(accounts::username.eq(username))
            .select(accounts::id)
            .first(&mut *self.conn)
            .optional()?;
        Ok(id.map(AccountId::new))
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    pub fn verify_credentials(&mut self, username: &str, password: &str) -> Result<AccountId> {
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::username.eq(username))
            .select(AccountRow::as_select())
            .first(&mut *self.conn)
            .optional()?;

        match row {
            Some(account) if account.password == password => Ok(AccountId::new(account.id)),
            _ => Err(ExchangeError::IncorrectPassword.into()),
        }
    }

    /// Bind `token` to the account, replacing any previous token.
    pub fn set_token(&mut self, account: AccountId, token: &SessionToken) -> Result<()> {
        let updated = diesel::update(accounts::table.find(account.get()))
            .set(accounts::token.eq(Some(token.as_str())))
            .execute(&mut *self.conn)?;
        if updated == 0 {
            return Err(ExchangeError::UserNotFound {
                user_id: account.into(),
            }
            .into());
        }
        Ok(())
    }

    /// Revoke a token. Fails when no account currently holds it.
    pub fn clear_token(&mut self, token: &SessionToken) -> Result<()> {
        let updated = diesel::update(accounts::table.filter(accounts::token.eq(token.as_str())))
            .set(accounts::token.eq(None::<String>))
            .execute(&mut *self.conn)?;
        if updated == 0 {
            return Err(ExchangeError::InvalidToken.into());
        }
        Ok(())
    }

    /// Resolve a live token to the user it belongs to.
    pub fn user_by_token(&mut self, token: &SessionToken) -> Result<User> {
        let account: Option<i64> = accounts::table
            .filter(accounts::token.eq(token.as_str()))
            .select(accounts::id)
            .first(&mut *self.conn)
            .optional()?;
        let account = account.ok_or(ExchangeError::InvalidToken)?;

        self.find_user(UserId::new(account))?
            .ok_or(Error::OrphanAccount {
                account_id: AccountId::new(account),
            })
    }

    fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = users::table
            .find(id.get())
            .select(UserRow::as_select())
            .first(&mut *self.conn)
            .optional()?;
        Ok(row.map(|r| User::new(UserId::new(r.id), r.name, r.balance)))
    }

    pub fn user(&mut self, id: UserId) -> Result<User> {
        self.find_user(id)?
            .ok_or_else(|| ExchangeError::UserNotFound { user_id: id }.into())
    }

    /// Persist name and balance. The balance may not be negative.
    pub fn update_user(&mut self, user: &User) -> Result<()> {
        if user.balance < 0 {
            return Err(ExchangeError::InvalidAmount {
                amount: user.balance,
            }
            .into());
        }
        let updated = diesel::update(users::table.find(user.id.get()))
            .set((users::name.eq(&user.name), users::balance.eq(user.balance)))
            .execute(&mut *self.conn)?;
        if updated == 0 {
            return Err(ExchangeError::UserNotFound { user_id: user.id }.into());
        }
        Ok(())
    }

    /// Add `delta` to a balance and return the new balance.
    pub fn adjust_balance(&mut self, id: UserId, delta: i64) -> Result<i64> {
        let mut user = self.user(id)?;
        let next = user
            .balance
            .checked_add(delta)
            .ok_or(ExchangeError::InvalidAmount { amount: delta })?;
        if next < 0 {
            return Err(ExchangeError::NotEnoughMoney {
                required: -delta,
                available: user.balance,
            }
            .into());
        }
        user.balance = next;
        self.update_user(&user)?;
        Ok(next)
    }

    // -------------------------------------------------------------------------
    // Products and market stock
    // -------------------------------------------------------------------------

    /// Create a product with stock and a seed price, or restock it if the
    /// name already exists. Restocking leaves price history untouched.
    pub fn add_product(&mut self, name: &str, stock: i64, seed_price: i64) -> Result<Product> {
        if stock < 0 {
            return Err(ExchangeError::InvalidAmount { amount: stock }.into());
        }

        if let Some(existing) = self.product_by_name(name)? {
            self.restock(existing.id, stock, seed_price)?;
            return Ok(existing);
        }

        if seed_price <= 0 {
            return Err(ExchangeError::InvalidAmount { amount: seed_price }.into());
        }

        diesel::insert_into(products::table)
            .values(&NewProductRow { name })
            .execute(&mut *self.conn)?;
        let id = ProductId::new(self.last_insert_rowid()?);

        diesel::insert_into(marketplace::table)
            .values(&MarketRow {
                product_id: id.get(),
                stock,
            })
            .execute(&mut *self.conn)?;
        self.append_price(id, Utc::now(), seed_price)?;

        Ok(Product::new(id, name))
    }

    /// Add stock for a known product, entering it into the market (with a
    /// seed price) if it was never stocked before.
    fn restock(&mut self, id: ProductId, stock: i64, seed_price: i64) -> Result<()> {
        if self.find_market_stock(id)?.is_some() {
            return self.adjust_market_stock(id, stock);
        }

        diesel::insert_into(marketplace::table)
            .values(&MarketRow {
                product_id: id.get(),
                stock,
            })
            .execute(&mut *self.conn)?;
        if self.latest_record(id)?.is_none() {
            if seed_price <= 0 {
                return Err(ExchangeError::InvalidAmount { amount: seed_price }.into());
            }
            self.append_price(id, Utc::now(), seed_price)?;
        }
        Ok(())
    }

    pub fn product(&mut self, id: ProductId) -> Result<Product> {
        let row: Option<ProductRow> = products::table
            .find(id.get())
            .select(ProductRow::as_select())
            .first(&mut *self.conn)
            .optional()?;
        row.map(|r| Product::new(ProductId::new(r.id), r.name))
            .ok_or_else(|| ExchangeError::product_not_found(id).into())
    }

    pub fn product_by_name(&mut self, name: &str) -> Result<Option<Product>> {
        let row: Option<ProductRow> = products::table
            .filter(products::name.eq(name))
            .select(ProductRow::as_select())
            .first(&mut *self.conn)
            .optional()?;
        Ok(row.map(|r| Product::new(ProductId::new(r.id), r.name)))
    }

    pub fn products(&mut self) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> = products::table
            .order(products::id.asc())
            .select(ProductRow::as_select())
            .load(&mut *self.conn)?;
        Ok(rows
            .into_iter()
            .map(|r| Product::new(ProductId::new(r.id), r.name))
            .collect())
    }

    fn find_market_stock(&mut self, id: ProductId) -> Result<Option<i64>> {
        let stock = marketplace::table
            .find(id.get())
            .select(marketplace::stock)
            .first(&mut *self.conn)
            .optional()?;
        Ok(stock)
    }

    /// Units of a product available in the market.
    pub fn market_stock(&mut self, id: ProductId) -> Result<i64> {
        self.find_market_stock(id)?
            .ok_or_else(|| ExchangeError::product_not_found(id).into())
    }

    /// Apply `delta` to market stock; stock may never go negative.
    pub fn adjust_market_stock(&mut self, id: ProductId, delta: i64) -> Result<()> {
        let current = self.market_stock(id)?;
        let next = current
            .checked_add(delta)
            .ok_or(ExchangeError::InvalidAmount { amount: delta })?;
        if next < 0 {
            return Err(ExchangeError::OutOfStock {
                requested: -delta,
                available: current,
            }
            .into());
        }
        diesel::update(marketplace::table.find(id.get()))
            .set(marketplace::stock.eq(next))
            .execute(&mut *self.conn)?;
        Ok(())
    }

    /// Every product that has entered the market, with its stock.
    pub fn market(&mut self) -> Result<Vec<MarketEntry>> {
        let rows: Vec<(ProductRow, i64)> = marketplace::table
            .inner_join(products::table)
            .order(products::id.asc())
            .select((ProductRow::as_select(), marketplace::stock))
            .load(&mut *self.conn)?;
        Ok(rows
            .into_iter()
            .map(|(p, stock)| MarketEntry {
                product: Product::new(ProductId::new(p.id), p.name),
                stock,
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Inventory
    // -------------------------------------------------------------------------

    /// Units of `product` held by `user`; zero when no row exists.
    pub fn inventory_count(&mut self, user: UserId, product: ProductId) -> Result<i64> {
        let count = inventory::table
            .find((user.get(), product.get()))
            .select(inventory::count)
            .first(&mut *self.conn)
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Apply `delta` to a user's holding, keeping the table sparse: a zero
    /// result deletes the row, a first positive delta creates it.
    pub fn adjust_inventory(&mut self, user: UserId, product: ProductId, delta: i64) -> Result<()> {
        self.user(user)?;
        self.product(product)?;

        let current = self.inventory_count(user, product)?;
        let next = current
            .checked_add(delta)
            .ok_or(ExchangeError::InvalidAmount { amount: delta })?;

        match (current, next) {
            (_, n) if n < 0 => Err(ExchangeError::NotInInventory {
                requested: -delta,
                available: current,
            }
            .into()),
            (0, 0) => Ok(()),
            (_, 0) => {
                diesel::delete(inventory::table.find((user.get(), product.get())))
                    .execute(&mut *self.conn)?;
                Ok(())
            }
            (0, n) => {
                diesel::insert_into(inventory::table)
                    .values(&InventoryRow {
                        user_id: user.get(),
                        product_id: product.get(),
                        count: n,
                    })
                    .execute(&mut *self.conn)?;
                Ok(())
            }
            (_, n) => {
                diesel::update(inventory::table.find((user.get(), product.get())))
                    .set(inventory::count.eq(n))
                    .execute(&mut *self.conn)?;
                Ok(())
            }
        }
    }

    pub fn inventory(&mut self, user: UserId) -> Result<Vec<InventoryEntry>> {
        let rows: Vec<InventoryRow> = inventory::table
            .filter(inventory::user_id.eq(user.get()))
            .order(inventory::product_id.asc())
            .select(InventoryRow::as_select())
            .load(&mut *self.conn)?;
        Ok(rows
            .into_iter()
            .map(|r| InventoryEntry {
                user_id: UserId::new(r.user_id),
                product_id: ProductId::new(r.product_id),
                count: r.count,
            })
            .collect())
    }

    pub fn holdings(&mut self, user: UserId) -> Result<Holdings> {
        let user = self.user(user)?;
        let inventory = self.inventory(user.id)?;
        Ok(Holdings { user, inventory })
    }

    // -------------------------------------------------------------------------
    // Price history
    // -------------------------------------------------------------------------

    /// Append a price record, then prune the product's history down to the
    /// retention limit.
    pub fn append_price(&mut self, product: ProductId, at: DateTime<Utc>, price: i64) -> Result<()> {
        if price <= 0 {
            return Err(ExchangeError::InvalidAmount { amount: price }.into());
        }

        diesel::insert_into(price_records::table)
            .values(&NewPriceRecordRow {
                product_id: product.get(),
                recorded_at: at.timestamp_millis(),
                price,
            })
            .execute(&mut *self.conn)?;

        let pruned = self.prune_history(product)?;
        trace!(product = %product, price, pruned, "Appended price record");
        Ok(())
    }

    fn prune_history(&mut self, product: ProductId) -> Result<usize> {
        let keep = i64::from(self.options.retention_limit);
        let stale: Vec<i64> = price_records::table
            .filter(price_records::product_id.eq(product.get()))
            .order((price_records::recorded_at.desc(), price_records::id.desc()))
            .select(price_records::id)
            .offset(keep)
            .load(&mut *self.conn)?;

        if stale.is_empty() {
            return Ok(0);
        }
        let deleted = diesel::delete(price_records::table.filter(price_records::id.eq_any(&stale)))
            .execute(&mut *self.conn)?;
        Ok(deleted)
    }

    fn latest_record(&mut self, product: ProductId) -> Result<Option<PriceRecordRow>> {
        let row = price_records::table
            .filter(price_records::product_id.eq(product.get()))
            .order((price_records::recorded_at.desc(), price_records::id.desc()))
            .select(PriceRecordRow::as_select())
            .first(&mut *self.conn)
            .optional()?;
        Ok(row)
    }

    /// Price of the most recent record.
    ///
    /// A known product without any record is an invariant violation and
    /// fails with [`Error::MissingPrice`].
    pub fn latest_price(&mut self, product: ProductId) -> Result<i64> {
        if let Some(row) = self.latest_record(product)? {
            return Ok(row.price);
        }
        self.product(product)?;
        Err(Error::MissingPrice { product_id: product })
    }

    /// Full retained history, oldest first.
    pub fn price_history(&mut self, product: ProductId) -> Result<Vec<PriceRecord>> {
        self.product(product)?;
        let rows: Vec<PriceRecordRow> = price_records::table
            .filter(price_records::product_id.eq(product.get()))
            .order((price_records::recorded_at.asc(), price_records::id.asc()))
            .select(PriceRecordRow::as_select())
            .load(&mut *self.conn)?;
        rows.into_iter().map(to_record).collect()
    }

    /// History within `[from, to]` inclusive, oldest first.
    pub fn price_history_between(
        &mut self,
        product: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        self.product(product)?;
        let rows: Vec<PriceRecordRow> = price_records::table
            .filter(price_records::product_id.eq(product.get()))
            .filter(price_records::recorded_at.ge(from.timestamp_millis()))
            .filter(price_records::recorded_at.le(to.timestamp_millis()))
            .order((price_records::recorded_at.asc(), price_records::id.asc()))
            .select(PriceRecordRow::as_select())
            .load(&mut *self.conn)?;
        rows.into_iter().map(to_record).collect()
    }

    pub fn price_record_count(&mut self, product: ProductId) -> Result<i64> {
        let count = price_records::table
            .filter(price_records::product_id.eq(product.get()))
            .count()
            .get_result(&mut *self.conn)?;
        Ok(count)
    }
}

fn to_record(row: PriceRecordRow) -> Result<PriceRecord> {
    let recorded_at = Utc
        .timestamp_millis_opt(row.recorded_at)
        .single()
        .ok_or_else(|| Error::Database(format!("invalid timestamp {}", row.recorded_at)))?;
    Ok(PriceRecord::new(
        ProductId::new(row.product_id),
        recorded_at,
        row.price,
    ))
}
