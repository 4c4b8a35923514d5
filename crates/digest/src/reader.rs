//! Lazy, bounded, chunk-by-chunk file reading.
//!
//! Thin wrapper around [`Read::take`] that hands out owned chunks so they can
//! be fed to a hash accumulator without ever holding the whole file in memory.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::Read;
use std::iter::FusedIterator;
use std::path::Path;

/// Chunk size used when the caller has no opinion.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Open a file and read it lazily in chunks of `chunk_size` bytes.
///
/// Every call opens the file afresh and starts from byte 0; nothing is shared
/// with a previous reader. When `limit` is given, the final chunk is truncated
/// so that no more than `limit` bytes are ever yielded in total.
///
/// # Examples
///
/// ```no_run
/// use fixity_digest::lazy_read;
///
/// # fn example() -> fixity_digest::error::Result<()> {
/// let mut total = 0;
/// for chunk in lazy_read("/etc/hostname", Some(1024), 256)? {
///     total += chunk?.len();
/// }
/// assert!(total <= 1024);
/// # Ok(())
/// # }
/// ```
pub fn lazy_read(path: impl AsRef<Path>, limit: Option<u64>, chunk_size: usize) -> Result<ChunkReader<File>> {
    if chunk_size == 0 {
        exn::bail!(ErrorKind::InvalidChunkSize);
    }
    let file = File::open(path.as_ref()).or_raise(|| ErrorKind::Io)?;
    ChunkReader::new(file, limit, chunk_size)
}

/// A finite iterator of byte chunks over any [`Read`]er.
///
/// Yields chunks of exactly `chunk_size` bytes, except for the last one. Once
/// an error has been yielded the iterator is exhausted.
pub struct ChunkReader<R> {
    inner: R,
    limit: Option<u64>,
    chunk_size: usize,
    consumed: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Fails with [`ErrorKind::InvalidChunkSize`] for a `chunk_size` of zero,
    /// which would never make progress.
    pub fn new(inner: R, limit: Option<u64>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            exn::bail!(ErrorKind::InvalidChunkSize);
        }
        Ok(Self { inner, limit, chunk_size, consumed: 0, done: false })
    }

    /// Declare that `offset` bytes were already consumed from `inner` before
    /// it was handed over (e.g. the caller seeked it). Counts towards `limit`.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.consumed = offset;
        self
    }

    /// Total number of bytes consumed from the underlying reader so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut wanted = self.chunk_size as u64;
        if let Some(limit) = self.limit {
            if self.consumed > limit {
                self.done = true;
                let consumed = self.consumed;
                return Some(Err(exn::Exn::from(ErrorKind::ReadBounds { limit, consumed })));
            }
            wanted = wanted.min(limit - self.consumed);
            if wanted == 0 {
                self.done = true;
                return None;
            }
        }
        let mut chunk = Vec::with_capacity(wanted as usize);
        match (&mut self.inner).take(wanted).read_to_end(&mut chunk) {
            Ok(0) => {
                self.done = true;
                None
            },
            Ok(read) => {
                self.consumed += read as u64;
                Some(Ok(chunk))
            },
            Err(err) => {
                self.done = true;
                Some(Err::<Vec<u8>, _>(err).or_raise(|| ErrorKind::Io))
            },
        }
    }
}

impl<R: Read> FusedIterator for ChunkReader<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    const TEXT: &[u8] = b"This is the path to the cessation of unease";

    fn collect<R: Read>(reader: ChunkReader<R>) -> Vec<Vec<u8>> {
        reader.collect::<Result<Vec<_>>>().unwrap()
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(7)]
    #[case(43)]
    #[case(DEFAULT_CHUNK_SIZE)]
    fn test_chunks_reassemble_to_input(#[case] chunk_size: usize) {
        let chunks = collect(ChunkReader::new(Cursor::new(TEXT), None, chunk_size).unwrap());
        assert_eq!(chunks.concat(), TEXT);
        // Only the final chunk may be short.
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.len(), chunk_size);
        }
    }

    #[rstest]
    #[case(Some(0), 4, b"".as_slice())]
    #[case(Some(5), 2, b"This ".as_slice())]
    #[case(Some(8), 4, b"This is ".as_slice())]
    #[case(Some(1000), 16, TEXT)]
    fn test_limit_truncates_final_chunk(#[case] limit: Option<u64>, #[case] chunk_size: usize, #[case] expected: &[u8]) {
        let chunks = collect(ChunkReader::new(Cursor::new(TEXT), limit, chunk_size).unwrap());
        assert_eq!(chunks.concat(), expected);
    }

    #[test]
    fn test_over_consumed_reader_fails_once() {
        let mut cursor = Cursor::new(TEXT);
        cursor.set_position(10);
        let mut reader = ChunkReader::new(cursor, Some(4), 2).unwrap().starting_at(10);
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(*err, ErrorKind::ReadBounds { limit: 4, consumed: 10 });
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut reader = ChunkReader::new(Cursor::new(b""), None, 8).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.consumed(), 0);
    }

    #[test]
    fn test_new_rejects_zero_chunk_size() {
        let err = ChunkReader::new(Cursor::new(TEXT), None, 0).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidChunkSize);
    }

    #[test]
    fn test_lazy_read_starts_from_zero_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f4");
        std::fs::write(&path, TEXT).unwrap();
        let first: Vec<u8> = collect(lazy_read(&path, Some(4), 3).unwrap()).concat();
        let second: Vec<u8> = collect(lazy_read(&path, None, 3).unwrap()).concat();
        assert_eq!(first, b"This");
        assert_eq!(second, TEXT);
    }

    #[test]
    fn test_lazy_read_rejects_zero_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, TEXT).unwrap();
        let err = lazy_read(&path, None, 0).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidChunkSize);
    }

    #[test]
    fn test_lazy_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = lazy_read(dir.path().join("nope"), None, 8).err().unwrap();
        assert_eq!(*err, ErrorKind::Io);
    }
}
