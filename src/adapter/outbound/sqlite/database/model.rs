//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{accounts, inventory, marketplace, price_records, products, users};

/// Database row for an account (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = accounts)]
pub struct NewAccountRow<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Database row for an account (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub token: Option<String>,
}

/// Database row for a user.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub balance: i64,
}

/// Database row for a product (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = products)]
pub struct NewProductRow<'a> {
    pub name: &'a str,
}

/// Database row for a product (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
}

/// Database row for market stock.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = marketplace)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub product_id: i64,
    pub stock: i64,
}

/// Database row for a user's holding of one product.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = inventory)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InventoryRow {
    pub user_id: i64,
    pub product_id: i64,
    pub count: i64,
}

/// Database row for a price record (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = price_records)]
pub struct NewPriceRecordRow {
    pub product_id: i64,
    pub recorded_at: i64,
    pub price: i64,
}

/// Database row for a price record (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = price_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRecordRow {
    pub id: i64,
    pub product_id: i64,
    pub recorded_at: i64,
    pub price: i64,
}
