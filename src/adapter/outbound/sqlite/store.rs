//! SQLite exchange store implementation.
//!
//! Provides persistent storage for accounts, products, stock, inventory and
//! price history using SQLite and Diesel ORM. Every public method runs as one
//! transaction; composite business operations use [`SqliteStore::transaction`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::database::connection::{create_pool, run_migrations, DbPool, PoolSettings};
use super::ledger::Ledger;
use crate::domain::{
    AccountId, Holdings, InventoryEntry, MarketEntry, PriceRecord, Product, ProductId,
    SessionToken, User, UserId,
};
use crate::error::{ConfigError, Result};

/// Settings fixed when the store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Price records kept per product; older ones are pruned on insert.
    pub retention_limit: u32,
    /// Balance credited to every new user.
    pub starting_balance: i64,
    /// Seed price for products added without an explicit price.
    pub initial_price: i64,
    /// Lock wait before a statement fails as busy.
    pub busy_timeout: Duration,
    /// Maximum pooled connections for file databases.
    pub pool_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retention_limit: 3600,
            starting_balance: 1000,
            initial_price: 100,
            busy_timeout: Duration::from_millis(5000),
            pool_size: 5,
        }
    }
}

/// SQLite-backed exchange store.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    /// Database connection pool.
    pool: DbPool,
    options: StoreOptions,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StoreOptions {
    /// Reject settings under which a stocked product could lose its last
    /// price record or a new user could start in debt.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.retention_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retention_limit",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.initial_price <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_price",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.starting_balance < 0 {
            return Err(ConfigError::InvalidValue {
                field: "starting_balance",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and run
    /// pending migrations.
    ///
    /// # Errors
    /// Returns a config error for invalid [`StoreOptions`], or an error if
    /// the pool cannot be built or migrations fail.
    pub fn open(database_url: &str, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let pool = create_pool(
            database_url,
            PoolSettings {
                max_size: options.pool_size,
                busy_timeout: options.busy_timeout,
            },
        )?;
        run_migrations(&pool)?;
        info!(
            url = %database_url,
            retention = options.retention_limit,
            "Exchange store opened"
        );
        Ok(Self { pool, options })
    }

    /// Private in-memory store, mostly for tests.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(options: StoreOptions) -> Result<Self> {
        Self::open(":memory:", options)
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so concurrent read-modify-write
    /// sequences serialize instead of losing updates. Returning `Err` from
    /// `f` rolls back everything it did.
    ///
    /// # Errors
    /// Propagates the closure's error, or a busy/connection error when the
    /// lock or a connection cannot be obtained in time.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger<'_>) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        conn.immediate_transaction(|conn| {
            let mut ledger = Ledger::new(conn, &self.options);
            f(&mut ledger)
        })
    }

    /// Run read-only statements against one consistent snapshot.
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger<'_>) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        diesel::Connection::transaction(&mut *conn, |conn| {
            let mut ledger = Ledger::new(conn, &self.options);
            f(&mut ledger)
        })
    }

    // -------------------------------------------------------------------------
    // Accounts and users
    // -------------------------------------------------------------------------

    /// Create an account and its user in one unit of work.
    ///
    /// # Errors
    /// `AccountAlreadyExists` if the username is taken.
    pub fn register_account(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AccountId> {
        let id = self.transaction(|l| l.register_account(username, password, display_name))?;
        debug!(account = %id, username, "Registered account");
        Ok(id)
    }

    /// # Errors
    /// `IncorrectPassword` for a wrong password or unknown username alike.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<AccountId> {
        self.read(|l| l.verify_credentials(username, password))
    }

    pub fn account_id(&self, username: &str) -> Result<Option<AccountId>> {
        self.read(|l| l.account_id(username))
    }

    pub fn add_token(&self, account: AccountId, token: &SessionToken) -> Result<()> {
        self.transaction(|l| l.set_token(account, token))
    }

    /// # Errors
    /// `InvalidToken` if no account holds the token.
    pub fn remove_token(&self, token: &SessionToken) -> Result<()> {
        self.transaction(|l| l.clear_token(token))
    }

    /// # Errors
    /// `InvalidToken` if no account holds the token.
    pub fn resolve_token(&self, token: &SessionToken) -> Result<User> {
        self.read(|l| l.user_by_token(token))
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.read(|l| l.user(id))
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        self.transaction(|l| l.update_user(user))
    }

    /// Credit (positive) or debit (negative) a balance.
    ///
    /// # Errors
    /// `NotEnoughMoney` if the balance would go negative.
    pub fn adjust_balance(&self, id: UserId, delta: i64) -> Result<i64> {
        self.transaction(|l| l.adjust_balance(id, delta))
    }

    pub fn holdings(&self, id: UserId) -> Result<Holdings> {
        self.read(|l| l.holdings(id))
    }

    // -------------------------------------------------------------------------
    // Products and market
    // -------------------------------------------------------------------------

    /// Add a product seeded at the configured initial price, or restock it
    /// if the name already exists.
    pub fn add_product(&self, name: &str, initial_stock: i64) -> Result<Product> {
        self.add_product_with_price(name, initial_stock, self.options.initial_price)
    }

    /// As [`add_product`](Self::add_product) with an explicit seed price.
    /// The price is ignored when the product already has history.
    pub fn add_product_with_price(&self, name: &str, stock: i64, price: i64) -> Result<Product> {
        let product = self.transaction(|l| l.add_product(name, stock, price))?;
        debug!(product = %product.id, name, stock, "Stocked product");
        Ok(product)
    }

    pub fn get_product(&self, id: ProductId) -> Result<Product> {
        self.read(|l| l.product(id))
    }

    pub fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        self.read(|l| l.product_by_name(name))
    }

    /// # Errors
    /// `OutOfStock` if the stock would go negative.
    pub fn adjust_market_stock(&self, id: ProductId, delta: i64) -> Result<()> {
        self.transaction(|l| l.adjust_market_stock(id, delta))
    }

    pub fn market_stock(&self, id: ProductId) -> Result<i64> {
        self.read(|l| l.market_stock(id))
    }

    /// # Errors
    /// `NotInInventory` if the count would go negative.
    pub fn adjust_user_inventory(&self, user: UserId, product: ProductId, delta: i64) -> Result<()> {
        self.transaction(|l| l.adjust_inventory(user, product, delta))
    }

    pub fn list_market(&self) -> Result<Vec<MarketEntry>> {
        self.read(|l| l.market())
    }

    pub fn list_products(&self) -> Result<Vec<Product>> {
        self.read(|l| l.products())
    }

    pub fn list_inventory(&self, user: UserId) -> Result<Vec<InventoryEntry>> {
        self.read(|l| l.inventory(user))
    }

    // -------------------------------------------------------------------------
    // Price history
    // -------------------------------------------------------------------------

    /// Append a record and prune to the retention limit, atomically.
    pub fn append_price_record(
        &self,
        product: ProductId,
        at: DateTime<Utc>,
        price: i64,
    ) -> Result<()> {
        self.transaction(|l| l.append_price(product, at, price))
    }

    pub fn price_history(&self, product: ProductId) -> Result<Vec<PriceRecord>> {
        self.read(|l| l.price_history(product))
    }

    pub fn price_history_between(
        &self,
        product: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        self.read(|l| l.price_history_between(product, from, to))
    }

    /// Records from `from` up to now.
    pub fn price_records_since(
        &self,
        product: ProductId,
        from: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        self.price_history_between(product, from, Utc::now())
    }

    /// # Errors
    /// `MissingPrice` if the product exists but has no record.
    pub fn latest_price(&self, product: ProductId) -> Result<i64> {
        self.read(|l| l.latest_price(product))
    }

    pub fn price_record_count(&self, product: ProductId) -> Result<i64> {
        self.read(|l| l.price_record_count(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind, ExchangeError};
    use chrono::TimeZone;

    fn store() -> SqliteStore {
        SqliteStore::in_memory(StoreOptions::default()).expect("open store")
    }

    fn store_with_retention(limit: u32) -> SqliteStore {
        SqliteStore::in_memory(StoreOptions {
            retention_limit: limit,
            ..StoreOptions::default()
        })
        .expect("open store")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Timestamps after the seed record that `add_product` writes at now.
    fn after_seed(secs: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(1) + chrono::Duration::seconds(secs)
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    #[test]
    fn register_creates_user_with_starting_balance() {
        let store = store();
        let id = store.register_account("admin", "admin", "Admin").unwrap();

        let user = store.get_user(id.into()).unwrap();
        assert_eq!(user.name, "Admin");
        assert_eq!(user.balance, 1000);
    }

    #[test]
    fn register_rejects_taken_username() {
        let store = store();
        store.register_account("admin", "pw", "Admin").unwrap();

        let err = store.register_account("admin", "other", "Other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountAlreadyExists);
    }

    #[test]
    fn verify_credentials_does_not_distinguish_unknown_user() {
        let store = store();
        let id = store.register_account("alice", "hunter2", "Alice").unwrap();

        assert_eq!(store.verify_credentials("alice", "hunter2").unwrap(), id);
        let wrong = store.verify_credentials("alice", "nope").unwrap_err();
        let unknown = store.verify_credentials("bob", "hunter2").unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(unknown.kind(), ErrorKind::IncorrectPassword);
    }

    #[test]
    fn token_resolves_until_removed() {
        let store = store();
        let id = store.register_account("alice", "pw", "Alice").unwrap();
        let token = SessionToken::new("abc123");

        store.add_token(id, &token).unwrap();
        assert_eq!(store.resolve_token(&token).unwrap().id, UserId::from(id));

        store.remove_token(&token).unwrap();
        assert_eq!(store.resolve_token(&token).unwrap_err().kind(), ErrorKind::InvalidToken);
        assert_eq!(store.remove_token(&token).unwrap_err().kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn adding_a_token_replaces_the_previous_one() {
        let store = store();
        let id = store.register_account("alice", "pw", "Alice").unwrap();
        let first = SessionToken::new("first");
        let second = SessionToken::new("second");

        store.add_token(id, &first).unwrap();
        store.add_token(id, &second).unwrap();

        assert!(store.resolve_token(&first).is_err());
        assert!(store.resolve_token(&second).is_ok());
    }

    #[test]
    fn unknown_user_lookup_fails() {
        let store = store();
        let err = store.get_user(UserId::new(99)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }

    #[test]
    fn update_user_rejects_negative_balance() {
        let store = store();
        let id = store.register_account("alice", "pw", "Alice").unwrap();
        let mut user = store.get_user(id.into()).unwrap();
        user.balance = -1;

        assert!(store.update_user(&user).is_err());
        assert_eq!(store.get_user(id.into()).unwrap().balance, 1000);
    }

    #[test]
    fn adjust_balance_never_goes_negative() {
        let store = store();
        let id: UserId = store.register_account("alice", "pw", "Alice").unwrap().into();

        assert_eq!(store.adjust_balance(id, -400).unwrap(), 600);
        let err = store.adjust_balance(id, -601).unwrap_err();
        assert!(matches!(
            err,
            Error::Exchange(ExchangeError::NotEnoughMoney {
                required: 601,
                available: 600
            })
        ));
        assert_eq!(store.get_user(id).unwrap().balance, 600);
    }

    // -------------------------------------------------------------------------
    // Products and market
    // -------------------------------------------------------------------------

    #[test]
    fn add_product_seeds_market_and_price() {
        let store = store();
        let apple = store.add_product("Apple", 100).unwrap();

        assert_eq!(store.market_stock(apple.id).unwrap(), 100);
        assert_eq!(store.latest_price(apple.id).unwrap(), 100);
        assert_eq!(store.price_record_count(apple.id).unwrap(), 1);
    }

    #[test]
    fn add_product_is_idempotent_on_name() {
        let store = store();
        let first = store.add_product_with_price("Apple", 100, 50).unwrap();
        let second = store.add_product_with_price("Apple", 25, 999).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_products().unwrap().len(), 1);
        assert_eq!(store.market_stock(first.id).unwrap(), 125);
        assert_eq!(store.latest_price(first.id).unwrap(), 50);
        assert_eq!(store.price_record_count(first.id).unwrap(), 1);
    }

    #[test]
    fn unknown_product_lookup_fails() {
        let store = store();
        let err = store.get_product(ProductId::new(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProductNotFound);
        assert!(store.find_product_by_name("Durian").unwrap().is_none());
    }

    #[test]
    fn market_stock_cannot_go_negative() {
        let store = store();
        let pineapple = store.add_product("Pineapple", 1).unwrap();

        let err = store.adjust_market_stock(pineapple.id, -10).unwrap_err();
        assert!(matches!(
            err,
            Error::Exchange(ExchangeError::OutOfStock {
                requested: 10,
                available: 1
            })
        ));
        assert_eq!(store.market_stock(pineapple.id).unwrap(), 1);

        store.adjust_market_stock(pineapple.id, -1).unwrap();
        assert_eq!(store.market_stock(pineapple.id).unwrap(), 0);
    }

    #[test]
    fn list_market_returns_every_stocked_product() {
        let store = store();
        store.add_product("Apple", 100).unwrap();
        store.add_product("Banana", 200).unwrap();

        let market = store.list_market().unwrap();
        let summary: Vec<(&str, i64)> = market
            .iter()
            .map(|e| (e.product.name.as_str(), e.stock))
            .collect();
        assert_eq!(summary, vec![("Apple", 100), ("Banana", 200)]);
    }

    // -------------------------------------------------------------------------
    // Inventory
    // -------------------------------------------------------------------------

    #[test]
    fn inventory_rows_exist_only_for_positive_counts() {
        let store = store();
        let user: UserId = store.register_account("alice", "pw", "Alice").unwrap().into();
        let apple = store.add_product("Apple", 10).unwrap();

        store.adjust_user_inventory(user, apple.id, 3).unwrap();
        assert_eq!(store.list_inventory(user).unwrap()[0].count, 3);

        store.adjust_user_inventory(user, apple.id, -3).unwrap();
        assert!(store.list_inventory(user).unwrap().is_empty());

        // zero delta on an absent row is a no-op, not a zero row
        store.adjust_user_inventory(user, apple.id, 0).unwrap();
        assert!(store.list_inventory(user).unwrap().is_empty());
    }

    #[test]
    fn inventory_cannot_go_negative() {
        let store = store();
        let user: UserId = store.register_account("alice", "pw", "Alice").unwrap().into();
        let apple = store.add_product("Apple", 10).unwrap();
        store.adjust_user_inventory(user, apple.id, 2).unwrap();

        let err = store.adjust_user_inventory(user, apple.id, -5).unwrap_err();
        assert!(matches!(
            err,
            Error::Exchange(ExchangeError::NotInInventory {
                requested: 5,
                available: 2
            })
        ));
        assert_eq!(store.holdings(user).unwrap().count_of(apple.id), 2);
    }

    // -------------------------------------------------------------------------
    // Price history
    // -------------------------------------------------------------------------

    #[test]
    fn latest_price_follows_each_insert() {
        let store = store();
        let apple = store.add_product("Apple", 100).unwrap();

        for (i, price) in [5000, 6000, 7000, 8000].into_iter().enumerate() {
            store
                .append_price_record(apple.id, after_seed(i as i64), price)
                .unwrap();
            assert_eq!(store.latest_price(apple.id).unwrap(), price);
        }
    }

    #[test]
    fn ranged_history_is_inclusive_and_ordered() {
        let store = store();
        let apple = store.add_product("Apple", 100).unwrap();
        for (i, price) in [5000, 6000, 7000, 8000].into_iter().enumerate() {
            store.append_price_record(apple.id, at(i as i64), price).unwrap();
        }

        let window = store.price_history_between(apple.id, at(1), at(3)).unwrap();
        let prices: Vec<i64> = window.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![6000, 7000, 8000]);
        assert_eq!(window[0].recorded_at, at(1));
        assert_eq!(window[2].recorded_at, at(3));
    }

    #[test]
    fn equal_timestamps_order_by_insertion() {
        let store = store();
        let apple = store.add_product("Apple", 100).unwrap();
        let same = after_seed(10);
        store.append_price_record(apple.id, same, 11).unwrap();
        store.append_price_record(apple.id, same, 12).unwrap();

        assert_eq!(store.latest_price(apple.id).unwrap(), 12);
        let tail: Vec<i64> = store
            .price_history(apple.id)
            .unwrap()
            .iter()
            .rev()
            .take(2)
            .map(|r| r.price)
            .collect();
        assert_eq!(tail, vec![12, 11]);
    }

    #[test]
    fn retention_keeps_only_the_most_recent_records() {
        let store = store_with_retention(3);
        let apple = store.add_product_with_price("Apple", 100, 1).unwrap();

        // seed record is "now"; these are older and get pruned first
        for (i, price) in [10, 20, 30].into_iter().enumerate() {
            store.append_price_record(apple.id, at(i as i64), price).unwrap();
        }

        let history = store.price_history(apple.id).unwrap();
        let prices: Vec<i64> = history.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![20, 30, 1]);
    }

    #[test]
    fn retention_limit_plus_one_inserts_keeps_limit() {
        let store = store_with_retention(4);
        let apple = store.add_product("Apple", 100).unwrap();
        let future = Utc::now() + chrono::Duration::hours(1);

        for i in 0..5 {
            store
                .append_price_record(apple.id, future + chrono::Duration::seconds(i), 100 + i)
                .unwrap();
        }

        let prices: Vec<i64> = store
            .price_history(apple.id)
            .unwrap()
            .iter()
            .map(|r| r.price)
            .collect();
        assert_eq!(prices, vec![101, 102, 103, 104]);
    }

    #[test]
    fn non_positive_prices_are_rejected() {
        let store = store();
        let apple = store.add_product("Apple", 100).unwrap();
        let err = store.append_price_record(apple.id, at(0), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn failed_transaction_rolls_back_every_statement() {
        let store = store();
        let apple = store.add_product("Apple", 10).unwrap();

        let result: Result<()> = store.transaction(|l| {
            l.adjust_market_stock(apple.id, -5)?;
            l.adjust_market_stock(apple.id, -50)
        });

        assert!(result.is_err());
        assert_eq!(store.market_stock(apple.id).unwrap(), 10);
    }

    // -------------------------------------------------------------------------
    // Options
    // -------------------------------------------------------------------------

    #[test]
    fn open_rejects_zero_retention() {
        let err = store_with_retention_result(0).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "retention_limit",
                ..
            })
        ));
    }

    #[test]
    fn open_rejects_non_positive_initial_price_and_negative_balance() {
        let price = SqliteStore::in_memory(StoreOptions {
            initial_price: 0,
            ..StoreOptions::default()
        })
        .unwrap_err();
        assert!(matches!(
            price,
            Error::Config(ConfigError::InvalidValue {
                field: "initial_price",
                ..
            })
        ));

        let balance = SqliteStore::in_memory(StoreOptions {
            starting_balance: -1,
            ..StoreOptions::default()
        })
        .unwrap_err();
        assert_eq!(balance.kind(), ErrorKind::Config);
    }

    #[test]
    fn retention_of_one_keeps_a_price_for_new_products() {
        let store = store_with_retention(1);
        let banana = store.add_product_with_price("Banana", 10, 5).unwrap();

        assert_eq!(store.price_record_count(banana.id).unwrap(), 1);
        assert_eq!(store.latest_price(banana.id).unwrap(), 5);
    }

    fn store_with_retention_result(limit: u32) -> Result<SqliteStore> {
        SqliteStore::in_memory(StoreOptions {
            retention_limit: limit,
            ..StoreOptions::default()
        })
    }
}
