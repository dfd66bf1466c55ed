//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and connection
//! configuration for SQLite databases.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Pool sizing and lock-wait settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of pooled connections. Ignored for in-memory databases.
    pub max_size: u32,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 5,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// True for URLs that open a private in-memory database per connection.
#[must_use]
pub fn is_memory_url(database_url: &str) -> bool {
    database_url == ":memory:" || database_url.contains("mode=memory")
}

#[derive(Debug)]
struct SqlitePragmas {
    busy_timeout: Duration,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        apply_pragmas(conn, self.busy_timeout, self.wal).map_err(diesel::r2d2::Error::QueryError)
    }
}

fn apply_pragmas(
    conn: &mut SqliteConnection,
    busy_timeout: Duration,
    wal: bool,
) -> std::result::Result<(), diesel::result::Error> {
    diesel::sql_query(format!("PRAGMA busy_timeout = {}", busy_timeout.as_millis())).execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;
    if wal {
        diesel::sql_query("PRAGMA journal_mode = WAL").execute(conn)?;
    }
    Ok(())
}

/// Create a connection pool for the given database URL.
///
/// Every new connection gets `busy_timeout` and foreign keys enabled; file
/// databases additionally switch to WAL. An in-memory URL yields a pool of
/// exactly one long-lived connection so all callers share one database.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str, settings: PoolSettings) -> Result<DbPool> {
    let memory = is_memory_url(database_url);
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let builder = Pool::builder()
        .connection_timeout(settings.busy_timeout.max(Duration::from_millis(250)))
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout: settings.busy_timeout,
            wal: !memory,
        }));

    let builder = if memory {
        builder.max_size(1).idle_timeout(None).max_lifetime(None)
    } else {
        builder.max_size(settings.max_size.max(1))
    };

    debug!(url = %database_url, memory, "Creating SQLite pool");
    builder
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(())
}
