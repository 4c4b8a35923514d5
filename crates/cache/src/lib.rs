//! Expiring cache of content digests.
//!
//! Maps a content reference (in practice a file path, but any unique string
//! will do) to the digest of its content and an expiry timestamp. The cache
//! is not the source of truth, the content is: an entry only saves the caller
//! from re-reading and re-hashing content it has seen recently.
//!
//! # Contract
//! Every backend implements [`CacheStore`] identically:
//! - [`store`](CacheStore::store) is an atomic upsert keyed by reference that
//!   stamps the entry with `now + ttl`; last write wins.
//! - [`fetch`](CacheStore::fetch) returns `None` for missing *and* stale
//!   entries alike. A stale row may still physically exist until purged.
//! - [`purge`](CacheStore::purge) bulk-deletes every stale entry. It is run
//!   once when a backend is constructed.
//!
//! # Backends
//! - [`MemoryStore`]: owned, process-local map. Nothing persists.
//! - [`SqliteStore`]: a single database file with a single writer.
//! - [`PostgresStore`]: a bounded connection pool (2 to 5 connections).
//!
//! Database backends run every statement in its own transaction, which is
//! committed on success and rolled back on failure before the error is
//! returned to the caller.

mod backend;
mod config;
mod entry;
pub mod error;

pub use crate::backend::{MemoryStore, PostgresStore, SqliteStore};
pub use crate::config::{BackendConfig, PostgresConfig, SqliteConfig};
pub use crate::entry::{Entry, Ttl, now};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A store selected at runtime.
pub type StoreHandle = Arc<dyn CacheStore + Send + Sync>;

/// Unified interface for cache backends.
///
/// # Examples
///
/// ```
/// use fixity_cache::{CacheStore, MemoryStore, Ttl};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> fixity_cache::error::Result<()> {
/// let cache = MemoryStore::new(Ttl::hours(1));
/// cache.store("/srv/data/f1", "12ca3ba5").await?;
/// let entry = cache.fetch("/srv/data/f1").await?.unwrap();
/// assert_eq!(entry.content_hash, "12ca3ba5");
/// assert!(cache.fetch("/srv/data/f2").await?.is_none());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// How long stored entries remain fresh.
    fn ttl(&self) -> Ttl;

    /// Insert or replace the entry for `reference`, expiring one TTL from now.
    ///
    /// Safe to call repeatedly; no prior entry is required.
    async fn store(&self, reference: &str, content_hash: &str) -> Result<()>;

    /// Fetch the entry for `reference` if it exists and is still fresh.
    async fn fetch(&self, reference: &str) -> Result<Option<Entry>>;

    /// Delete every entry whose expiry has passed, returning how many went.
    ///
    /// Safe to call on an empty store.
    async fn purge(&self) -> Result<u64>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn ttl(&self) -> Ttl {
        (**self).ttl()
    }

    async fn store(&self, reference: &str, content_hash: &str) -> Result<()> {
        (**self).store(reference, content_hash).await
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Entry>> {
        (**self).fetch(reference).await
    }

    async fn purge(&self) -> Result<u64> {
        (**self).purge().await
    }
}

/// Construct the backend described by `config`.
///
/// Connection problems surface here rather than on first use.
pub async fn connect(config: &BackendConfig, ttl: Ttl) -> Result<StoreHandle> {
    let handle: StoreHandle = match config {
        BackendConfig::Memory => Arc::new(MemoryStore::new(ttl)),
        BackendConfig::Sqlite(sqlite) => Arc::new(SqliteStore::connect(sqlite, ttl).await?),
        BackendConfig::Postgres(postgres) => Arc::new(PostgresStore::connect(postgres, ttl).await?),
    };
    Ok(handle)
}
