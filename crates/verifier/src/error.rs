//! Verifier Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use fixity_digest::error::{Error as DigestError, ErrorKind as DigestErrorKind};
use std::path::PathBuf;

/// A verifier error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for verifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of filesystem object an operation needs.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing exists at the path.
    #[display("no such file or directory: {}", _0.display())]
    MissingReference(#[error(not(source))] PathBuf),
    /// Something exists at the path, but it is the wrong kind of thing.
    #[display("expected a {expected}: {}", path.display())]
    ReferenceType { path: PathBuf, expected: Expected },
    /// `update` or `finish` without a live session (never started, or
    /// already finished).
    #[display("no hash session in progress for {}", _0.display())]
    MissingHash(#[error(not(source))] PathBuf),
    /// Reading or hashing the content failed.
    #[display("digest error: {_0}")]
    Digest(DigestErrorKind),
    /// The cache backend failed; its error tree is attached as a child.
    #[display("cache error")]
    Cache,
    /// Cache keys are UTF-8; this path can't be one.
    #[display("path is not valid UTF-8: {}", _0.display())]
    InvalidReference(#[error(not(source))] PathBuf),
    /// Inspecting the filesystem failed for a reason other than absence.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The blocking hashing task panicked or was cancelled.
    #[display("hashing task failed")]
    Task,
}

impl ErrorKind {
    /// Convert a digest error into a verifier error, keeping the digest
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn digest(err: DigestError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Digest(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Digest(kind) => kind.is_retryable(),
            Self::Cache | Self::Io(_) => true,
            _ => false,
        }
    }
}
