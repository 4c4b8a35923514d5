//! Cache entries and their expiry.

use time::UtcDateTime;

const SECONDS_PER_HOUR: i64 = 60 * 60;

/// Current time as Unix epoch seconds.
pub fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// How long a freshly stored digest is trusted, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ttl(u32);

impl Ttl {
    pub const DEFAULT_HOURS: u32 = 24;

    pub const fn hours(hours: u32) -> Self {
        Self(hours)
    }

    pub fn as_hours(&self) -> u32 {
        self.0
    }

    /// Expiry timestamp for an entry written at `now`.
    pub fn stale_after_from(&self, now: i64) -> i64 {
        now.saturating_add(i64::from(self.0) * SECONDS_PER_HOUR)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self(Self::DEFAULT_HOURS)
    }
}

/// A content reference, the digest of its content, and the instant after
/// which that digest must no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Entry {
    pub reference: String,
    pub content_hash: String,
    /// Unix epoch seconds.
    pub stale_after: i64,
}

impl Entry {
    /// Build an entry that expires one `ttl` from now.
    pub fn new(reference: impl Into<String>, content_hash: impl Into<String>, ttl: Ttl) -> Self {
        Self {
            reference: reference.into(),
            content_hash: content_hash.into(),
            stale_after: ttl.stale_after_from(now()),
        }
    }

    /// An entry is valid up to and including its `stale_after` second.
    pub fn is_fresh_at(&self, now: i64) -> bool {
        now <= self.stale_after
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now())
    }

    /// Staleness filter shared by every backend's `fetch`: a stale row is
    /// reported exactly like a missing one.
    pub(crate) fn into_fresh(self) -> Option<Self> {
        if self.is_fresh() {
            return Some(self);
        }
        tracing::debug!(reference = %self.reference, stale_after = self.stale_after, "Cache entry is stale");
        None
    }
}
