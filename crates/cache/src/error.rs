//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Backend errors (sqlx) are kept as
//! children in the tree; nothing here is retried automatically.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Could not establish the backend (bad path, unreachable server,
    /// rejected credentials).
    #[display("could not connect to cache backend")]
    Connect,
    /// The `content_hashes` table could not be created.
    #[display("could not prepare cache schema")]
    Schema,
    /// A statement or its transaction failed; the transaction was rolled back.
    #[display("database error")]
    Database,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect | Self::Database)
    }
}
