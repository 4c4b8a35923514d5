//! Streaming BLAKE3 digests of file contents.
//!
//! Files are read lazily in fixed-size chunks (see [`lazy_read`]) and fed into
//! a [`blake3::Hasher`]. The accumulator is returned unfinalized so callers
//! can keep feeding it, which is what incremental hashing sessions build on.
//! Chunking never influences the result: hashing `N` chunks is identical to
//! hashing their concatenation in one go.

pub mod error;
mod reader;

use crate::error::Result;
pub use crate::reader::{ChunkReader, DEFAULT_CHUNK_SIZE, lazy_read};
pub use blake3::Hasher;
use std::path::Path;
use tracing::instrument;

/// Feed the first `limit` bytes of a file (or all of it) into a fresh hasher.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn consume(path: impl AsRef<Path>, limit: Option<u64>) -> Result<Hasher> {
    let mut hasher = Hasher::new();
    for chunk in lazy_read(path, limit, DEFAULT_CHUNK_SIZE)? {
        hasher.update(&chunk?);
    }
    Ok(hasher)
}

/// One-shot path: hash every byte of a file.
///
/// The accumulator is returned so the caller decides when to finalize; use
/// [`hex_digest`] to render it.
pub fn digest_whole_file(path: impl AsRef<Path>) -> Result<Hasher> {
    consume(path, None)
}

/// Canonical lowercase hexadecimal rendering of the digest so far.
///
/// Finalizing doesn't consume the hasher; more data can be fed afterwards.
pub fn hex_digest(hasher: &Hasher) -> String {
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"".as_slice(), "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262")]
    #[case(b"Thus I have heard".as_slice(), "12ca3ba5d55699275f60d4ffd274acf408537fbd90dfe135cc8f00114cac998c")]
    #[case(b"This is unease".as_slice(), "4254c616803071dffeda5515dc105191d35eeaeeea45fa6fe18de7eed088b97c")]
    fn test_known_digests(#[case] content: &[u8], #[case] expected: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, content).unwrap();
        assert_eq!(hex_digest(&digest_whole_file(&path).unwrap()), expected);
    }

    #[test]
    fn test_chunking_does_not_change_digest() {
        // Spans several default-sized chunks with an uneven tail.
        let content: Vec<u8> = (0..3 * DEFAULT_CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, &content).unwrap();
        let one_shot = hex_digest(&digest_whole_file(&path).unwrap());
        assert_eq!(one_shot, blake3::hash(&content).to_string());
        for chunk_size in [1, 3, 64, 5000] {
            let mut hasher = Hasher::new();
            for chunk in lazy_read(&path, None, chunk_size).unwrap() {
                hasher.update(&chunk.unwrap());
            }
            assert_eq!(hex_digest(&hasher), one_shot);
        }
    }

    #[test]
    fn test_consume_prefix_then_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, b"Thus I have heard").unwrap();
        let mut hasher = consume(&path, Some(5)).unwrap();
        hasher.update(b"I have heard");
        assert_eq!(hex_digest(&hasher), "12ca3ba5d55699275f60d4ffd274acf408537fbd90dfe135cc8f00114cac998c");
    }

    #[test]
    fn test_hex_digest_is_lowercase_and_fixed_length() {
        let digest = hex_digest(&Hasher::new());
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
