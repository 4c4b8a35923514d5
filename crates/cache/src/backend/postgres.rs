//! Pooled PostgreSQL backend.

use crate::CacheStore;
use crate::backend::{begin, settle};
use crate::config::PostgresConfig;
use crate::entry::{Entry, Ttl, now};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::instrument;

const CREATE_TABLE: &str = include_str!("../../queries/postgres/create_table.sql");
const UPSERT: &str = include_str!("../../queries/postgres/upsert.sql");
const FETCH: &str = include_str!("../../queries/postgres/fetch.sql");
const PURGE: &str = include_str!("../../queries/postgres/purge.sql");
const MIN_CONNECTIONS: u32 = 2;
const MAX_CONNECTIONS: u32 = 5;

/// Cache backend on a PostgreSQL server.
///
/// Connections come from a bounded pool shared by every clone of this store.
/// Each operation checks out one connection for the length of its
/// transaction. Separate processes sharing the table rely on PostgreSQL's
/// transaction isolation alone.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    ttl: Ttl,
}

impl PostgresStore {
    /// Connect to the server, create the table if needed and purge stale rows.
    ///
    /// Fails if the server cannot be reached or rejects the credentials.
    #[instrument(skip_all, fields(host = %config.host, dbname = %config.dbname, user = %config.user))]
    pub async fn connect(config: &PostgresConfig, ttl: Ttl) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password);
        let pool = PgPoolOptions::new()
            .min_connections(MIN_CONNECTIONS)
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Connect)?;
        let store = Self { pool, ttl };
        store.create_table().await?;
        store.purge().await?;
        Ok(store)
    }

    #[instrument("creating cache table", skip(self))]
    async fn create_table(&self) -> Result<()> {
        let mut tx = begin(&self.pool).await.or_raise(|| ErrorKind::Schema)?;
        let outcome = sqlx::query(CREATE_TABLE).execute(&mut *tx).await;
        settle(tx, outcome).await.or_raise(|| ErrorKind::Schema)?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for all connections to be returned and close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheStore for PostgresStore {
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

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn purge(&self) -> Result<u64> {
        let mut tx = begin(&self.pool).await?;
        let outcome = sqlx::query(PURGE).bind(now()).execute(&mut *tx).await;
        let done = settle(tx, outcome).await?;
        Ok(done.rows_affected())
    }
}

// These need a real server and are ignored by default. Run them with
// `cargo test -p fixity-cache -- --ignored` after setting FIXITY_TEST_PG_HOST,
// FIXITY_TEST_PG_DBNAME, FIXITY_TEST_PG_USER and optionally
// FIXITY_TEST_PG_PASSWORD.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::contract;

    const TWO_DAYS: i64 = 2 * 24 * 60 * 60;

    fn config_from_env() -> PostgresConfig {
        let var = |name: &str| std::env::var(format!("FIXITY_TEST_PG_{name}"));
        let required = |name: &str| var(name).unwrap_or_else(|_| panic!("FIXITY_TEST_PG_{name} must be set"));
        PostgresConfig::new(required("HOST"), required("DBNAME"), required("USER"), var("PASSWORD").unwrap_or_default())
    }

    /// References unique to this test run, so parallel runs don't collide.
    fn reference(test: &str) -> String {
        format!("/fixity-test-{}/{test}", std::process::id())
    }

    async fn cleanup(store: &PostgresStore, reference: &str) {
        sqlx::query("DELETE FROM content_hashes WHERE reference = $1")
            .bind(reference)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server (FIXITY_TEST_PG_*)"]
    async fn test_contract() {
        let config = config_from_env();
        let store = PostgresStore::connect(&config, Ttl::default()).await.unwrap();
        let refs: Vec<String> = ["f0", "f1", "f2", "f3"].iter().map(|name| reference(name)).collect();
        contract::fetch_missing(&store, &refs[0]).await;
        contract::store_then_fetch(&store, &refs[1]).await;
        contract::upsert_replaces(&store, &refs[2]).await;
        contract::purge_keeps_fresh(&store, &refs[3]).await;
        for r in &refs {
            cleanup(&store, r).await;
        }
        store.close().await;
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server (FIXITY_TEST_PG_*)"]
    async fn test_stale_row_is_hidden_until_purged() {
        let config = config_from_env();
        let store = PostgresStore::connect(&config, Ttl::default()).await.unwrap();
        let f1 = reference("stale");
        store.store(&f1, "one").await.unwrap();
        sqlx::query("UPDATE content_hashes SET stale_after = $1 WHERE reference = $2")
            .bind(now() - TWO_DAYS)
            .bind(&f1)
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.fetch(&f1).await.unwrap().is_none());
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content_hashes WHERE reference = $1")
            .bind(&f1)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.purge().await.unwrap() >= 1);
        cleanup(&store, &f1).await;
        store.close().await;
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server (FIXITY_TEST_PG_*)"]
    async fn test_pool_bounds() {
        let config = config_from_env();
        let store = PostgresStore::connect(&config, Ttl::default()).await.unwrap();
        assert_eq!(store.pool().options().get_min_connections(), MIN_CONNECTIONS);
        assert_eq!(store.pool().options().get_max_connections(), MAX_CONNECTIONS);
        store.close().await;
    }
}
