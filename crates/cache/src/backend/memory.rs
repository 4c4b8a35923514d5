//! In-memory cache backend.

use crate::CacheStore;
use crate::entry::{Entry, Ttl, now};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;

/// Process-local cache backend.
///
/// Entries live in a `HashMap` behind a [`RwLock`] owned by this instance, so
/// two stores never see each other's entries and nothing survives the
/// process. Good enough for tests and one-shot programs.
///
/// The raw accessors ([`entry`](Self::entry),
/// [`set_stale_after`](Self::set_stale_after)) bypass the staleness check.
/// They are NOT behind `#[cfg(test)]` so that other crates can use them in
/// their tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ttl: Ttl,
    storage: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store. There is nothing to purge yet.
    pub fn new(ttl: Ttl) -> Self {
        Self { ttl, storage: RwLock::new(HashMap::new()) }
    }

    /// The stored entry for `reference`, stale or not.
    pub async fn entry(&self, reference: &str) -> Option<Entry> {
        self.storage.read().await.get(reference).cloned()
    }

    /// Overwrite the expiry of an existing entry, e.g. to back-date it.
    ///
    /// Returns `false` if there is no entry for `reference`.
    pub async fn set_stale_after(&self, reference: &str, stale_after: i64) -> bool {
        match self.storage.write().await.get_mut(reference) {
            Some(entry) => {
                entry.stale_after = stale_after;
                true
            },
            None => false,
        }
    }

    /// Number of entries held, including stale ones.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn ttl(&self) -> Ttl {
        self.ttl
    }

    async fn store(&self, reference: &str, content_hash: &str) -> Result<()> {
        let entry = Entry::new(reference, content_hash, self.ttl);
        self.storage.write().await.insert(reference.to_string(), entry);
        Ok(())
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Entry>> {
        Ok(self.entry(reference).await.and_then(Entry::into_fresh))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn purge(&self) -> Result<u64> {
        let now = now();
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, entry| entry.is_fresh_at(now));
        Ok((before - storage.len()) as u64)
    }
}
