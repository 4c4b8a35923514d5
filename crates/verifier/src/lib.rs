//! Answers "what is the digest of this content right now?", consulting a
//! [`CacheStore`] before touching the disk.
//!
//! - [`check_file`](ContentVerifier::check_file) returns a fresh cached digest
//!   when there is one, otherwise hashes the file and writes the result back.
//! - [`check_directory`](ContentVerifier::check_directory) does the same for
//!   every file below a directory, one file at a time.
//! - [`start`](ContentVerifier::start), [`update`](ContentVerifier::update) and
//!   [`finish`](ContentVerifier::finish) hash content that arrives in pieces.
//!   Sessions live in the verifier only; they are never persisted.
//!
//! Cache keys are paths exactly as given, so `./f1` and `f1` are different
//! entries.

pub mod error;
mod reference;
mod walk;

use crate::error::{ErrorKind, Expected, Result};
pub use crate::walk::{FileStream, walk};
use blake3::Hasher;
use exn::{OptionExt, ResultExt};
use fixity_cache::{CacheStore, MemoryStore};
use fixity_digest::hex_digest;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Digests files through a cache, and tracks incremental hash sessions.
///
/// Sessions are keyed by path and owned by this instance. Driving the same
/// path from several places at once is not supported, which is why the
/// session operations take `&mut self`.
#[derive(Debug)]
pub struct ContentVerifier<S: CacheStore = MemoryStore> {
    store: S,
    sessions: HashMap<PathBuf, Hasher>,
}

impl Default for ContentVerifier<MemoryStore> {
    fn default() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl<S: CacheStore> ContentVerifier<S> {
    pub fn new(store: S) -> Self {
        Self { store, sessions: HashMap::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The digest of a file, from the cache if fresh.
    ///
    /// With `force`, the cache is not consulted and the file is always read.
    /// Either way a computed digest is written back with a new expiry.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn check_file(&self, path: impl AsRef<Path>, force: bool) -> Result<String> {
        let path = path.as_ref();
        let key = reference::cache_key(path)?;
        reference::expect(path, Expected::File).await?;
        self.check(path, key, force).await
    }

    /// Digests of every file below a directory, keyed by path.
    ///
    /// Files are checked exactly as [`check_file`](Self::check_file) would.
    /// Sub-directories are walked but don't appear in the result. The first
    /// failure aborts the walk.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn check_directory(&self, path: impl AsRef<Path>, force: bool) -> Result<BTreeMap<PathBuf, String>> {
        let root = path.as_ref();
        reference::cache_key(root)?;
        reference::expect(root, Expected::Directory).await?;
        let mut digests = BTreeMap::new();
        let mut files = walk(root);
        while let Some(file) = files.next().await {
            let file = file?;
            let digest = self.check(&file, reference::cache_key(&file)?, force).await?;
            digests.insert(file, digest);
        }
        tracing::debug!(files = digests.len(), "Checked directory");
        Ok(digests)
    }

    async fn check(&self, path: &Path, key: &str, force: bool) -> Result<String> {
        if !force {
            if let Some(entry) = self.store.fetch(key).await.or_raise(|| ErrorKind::Cache)? {
                tracing::debug!(path = key, "Cache hit");
                return Ok(entry.content_hash);
            }
            tracing::debug!(path = key, "Cache miss");
        }
        let hasher = hash_in_background(path.to_path_buf(), None).await?;
        let digest = hex_digest(&hasher);
        tracing::info!(path = key, force, digest, "Computed digest");
        self.store.store(key, &digest).await.or_raise(|| ErrorKind::Cache)?;
        Ok(digest)
    }

    /// Open a hash session for a file, replacing any existing one.
    ///
    /// With `consume_bytes > 0` the first `consume_bytes` bytes of the file
    /// are fed in straight away, so a caller that already has the start of
    /// the content can carry on from there with [`update`](Self::update).
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn start(&mut self, path: impl AsRef<Path>, consume_bytes: u64) -> Result<()> {
        let path = path.as_ref();
        reference::cache_key(path)?;
        reference::expect(path, Expected::File).await?;
        let hasher = match consume_bytes {
            0 => Hasher::new(),
            limit => hash_in_background(path.to_path_buf(), Some(limit)).await?,
        };
        if self.sessions.insert(path.to_path_buf(), hasher).is_some() {
            tracing::debug!("Replaced an unfinished session");
        }
        Ok(())
    }

    /// Feed more content into an open session.
    pub fn update(&mut self, path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let hasher = self.sessions.get_mut(path).ok_or_raise(|| ErrorKind::MissingHash(path.to_path_buf()))?;
        hasher.update(bytes);
        Ok(())
    }

    /// Close a session, cache its digest and return it.
    ///
    /// The session is only removed once the digest is stored; if the store
    /// fails the session is still open and `finish` can be retried.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn finish(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let hasher = self.sessions.get(path).ok_or_raise(|| ErrorKind::MissingHash(path.to_path_buf()))?;
        let digest = hex_digest(hasher);
        let key = reference::cache_key(path)?;
        self.store.store(key, &digest).await.or_raise(|| ErrorKind::Cache)?;
        self.sessions.remove(path);
        Ok(digest)
    }

    pub fn has_session(&self, path: impl AsRef<Path>) -> bool {
        self.sessions.contains_key(path.as_ref())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop a session without storing anything. Returns whether one existed.
    pub fn abandon(&mut self, path: impl AsRef<Path>) -> bool {
        self.sessions.remove(path.as_ref()).is_some()
    }
}

/// Hashing is blocking file I/O; keep it off the async workers.
async fn hash_in_background(path: PathBuf, limit: Option<u64>) -> Result<Hasher> {
    tokio::task::spawn_blocking(move || fixity_digest::consume(&path, limit).map_err(ErrorKind::digest))
        .await
        .or_raise(|| ErrorKind::Task)?
}
