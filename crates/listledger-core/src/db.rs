//! Database connection and schema installation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::Result;

/// Handle to the ledger's `SQLite` database.
///
/// Owns the connection pool and the three ledger tables: `lists`,
/// `subscribers` and `subscriptions`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database at the given path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        debug!("Opened ledger database at {database_path}");
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// The pool holds a single connection that never expires, since the
    /// data lives only as long as that connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS lists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                element_id INTEGER,
                list_type TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                handle TEXT NOT NULL,
                total_subscribers INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(list_type, handle)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS subscribers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER UNIQUE,
                email TEXT,
                first_name TEXT,
                last_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (user_id IS NOT NULL OR email IS NOT NULL)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                subscriber_id INTEGER NOT NULL REFERENCES subscribers(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                UNIQUE(list_id, subscriber_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Email is the fallback identity lookup
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_subscribers_email ON subscribers(email)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_subscriptions_subscriber
            ON subscriptions(subscriber_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lists_handle ON lists(handle)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Drop the ledger tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn drop_schema(&self) -> Result<()> {
        for table in ["subscriptions", "subscribers", "lists"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&self.pool)
                .await?;
        }
        debug!("Dropped ledger tables");
        Ok(())
    }

    /// Begin a write transaction.
    ///
    /// The write lock is taken up front (`BEGIN IMMEDIATE`), so concurrent
    /// writers wait on the busy timeout instead of failing when a read
    /// inside the transaction would later need to upgrade.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be obtained or the lock is
    /// not granted before the busy timeout.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Acquire a connection for read-only work.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be obtained.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Current time in the format stored in timestamp columns.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp, falling back to the Unix epoch for
/// values that were not written by this crate.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or(DateTime::<Utc>::UNIX_EPOCH, |t| {
        t.with_timezone(&Utc)
    })
}
