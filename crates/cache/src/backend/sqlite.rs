//! Embedded single-file SQLite backend.

use crate::CacheStore;
use crate::backend::{begin, settle};
use crate::config::SqliteConfig;
use crate::entry::{Entry, Ttl, now};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::instrument;

const CREATE_TABLE: &str = include_str!("../../queries/sqlite/create_table.sql");
const UPSERT: &str = include_str!("../../queries/sqlite/upsert.sql");
const FETCH: &str = include_str!("../../queries/sqlite/fetch.sql");
const PURGE: &str = include_str!("../../queries/sqlite/purge.sql");
// Single writer: every operation queues for the one connection.
const MAX_CONNECTIONS: u32 = 1;

/// Cache backend stored in one SQLite database file.
///
/// The pool holds exactly one connection, so operations from this store are
/// serialized. Other processes opening the same file are arbitrated by
/// SQLite's own locking.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    ttl: Ttl,
}

impl SqliteStore {
    async fn new(pool_options: SqlitePoolOptions, options: SqliteConnectOptions, ttl: Ttl) -> Result<Self> {
        let pool = pool_options
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Connect)?;
        let store = Self { pool, ttl };
        store.create_table().await?;
        store.purge().await?;
        Ok(store)
    }

    /// Open (creating if necessary) the database file `config.path/config.name`.
    ///
    /// The directory must already exist.
    #[instrument(skip_all, fields(file = %config.file().display()))]
    pub async fn connect(config: &SqliteConfig, ttl: Ttl) -> Result<Self> {
        let options = Self::base_options().filename(config.file()).create_if_missing(true);
        Self::new(SqlitePoolOptions::new(), options, ttl).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory(ttl: Ttl) -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // The database lives only as long as its connection, so it must never
        // be reaped or recycled.
        let pool_options = SqlitePoolOptions::new()
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
        Self::new(pool_options, options, ttl).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Rollback journal keeps the database to a single file on disk.
            .journal_mode(SqliteJournalMode::Delete)
            // Another process may hold the write lock for a moment.
            .busy_timeout(Duration::from_millis(1500))
    }

    #[instrument("creating cache table", skip(self))]
    async fn create_table(&self) -> Result<()> {
        let mut tx = begin(&self.pool).await.or_raise(|| ErrorKind::Schema)?;
        let outcome = sqlx::query(CREATE_TABLE).execute(&mut *tx).await;
        settle(tx, outcome).await.or_raise(|| ErrorKind::Schema)?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This is useful for running custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for the connection to be returned and close it.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    fn ttl(&self) -> Ttl {
        self.ttl
    }

    async fn store(&self, reference: &str, content_hash: &str) -> Result<()> {
        let entry = Entry::new(reference, content_hash, self.ttl);
        let mut tx = begin(&self.pool).await?;
        let outcome = sqlx::query(UPSERT)
            .bind(&entry.reference)
            .bind(&entry.content_hash)
            .bind(entry.stale_after)
            .execute(&mut *tx)
            .await;
        settle(tx, outcome).await?;
        Ok(())
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Entry>> {
        let mut tx = begin(&self.pool).await?;
        let outcome = sqlx::query_as::<_, Entry>(FETCH).bind(reference).fetch_optional(&mut *tx).await;
        let row = settle(tx, outcome).await?;
        Ok(row.and_then(Entry::into_fresh))
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn purge(&self) -> Result<u64> {
        let mut tx = begin(&self.pool).await?;
        let outcome = sqlx::query(PURGE).bind(now()).execute(&mut *tx).await;
        let done = settle(tx, outcome).await?;
        Ok(done.rows_affected())
    }
}
