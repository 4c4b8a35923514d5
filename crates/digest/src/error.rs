//! Digest Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A digest error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening or reading the file failed. The I/O error is attached as a
    /// child in the error tree.
    #[display("I/O error")]
    Io,
    /// More bytes were consumed than the caller-specified bound permits.
    /// This signals misuse by the caller, not the end of the file.
    #[display("read {consumed} bytes, exceeding the limit of {limit}")]
    ReadBounds { limit: u64, consumed: u64 },
    /// Chunks must be at least one byte long.
    #[display("chunk size must be greater than zero")]
    InvalidChunkSize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Io.to_string(), "I/O error");
        assert_eq!(
            ErrorKind::ReadBounds { limit: 4, consumed: 6 }.to_string(),
            "read 6 bytes, exceeding the limit of 4"
        );
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Io.is_retryable());
        assert!(!ErrorKind::ReadBounds { limit: 1, consumed: 2 }.is_retryable());
        assert!(!ErrorKind::InvalidChunkSize.is_retryable());
    }
}
