#![allow(dead_code)]

use exchange_sim::adapter::outbound::sqlite::{SqliteStore, StoreOptions};
use exchange_sim::domain::{Product, ProductId, UserId};
use tempfile::TempDir;

/// File-backed store in a temporary directory, removed on drop.
pub struct TempStore {
    pub store: SqliteStore,
    _dir: TempDir,
}

impl TempStore {
    pub fn create() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("exchange.db");
        let store = SqliteStore::open(path.to_str().expect("utf-8 path"), options)
            .expect("open store");
        Self { store, _dir: dir }
    }
}

/// Balance, held units of `product`, and market stock of `product`.
pub fn snapshot(store: &SqliteStore, user: UserId, product: ProductId) -> (i64, i64, i64) {
    (
        store.get_user(user).expect("user").balance,
        store.holdings(user).expect("holdings").count_of(product),
        store.market_stock(product).expect("stock"),
    )
}

pub fn register(store: &SqliteStore, username: &str) -> UserId {
    store
        .register_account(username, "pw", username)
        .expect("register")
        .into()
}

pub fn stock(store: &SqliteStore, name: &str, units: i64, price: i64) -> Product {
    store
        .add_product_with_price(name, units, price)
        .expect("add product")
}
