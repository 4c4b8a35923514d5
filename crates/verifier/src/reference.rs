//! Checks run on a path before anything is read or cached.

use crate::error::{ErrorKind, Expected, Result};
use exn::{OptionExt, ResultExt};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tokio::fs;

/// The cache key for a path.
pub(crate) fn cache_key(path: &Path) -> Result<&str> {
    path.to_str().ok_or_raise(|| ErrorKind::InvalidReference(path.to_path_buf()))
}

/// Make sure `path` exists (following symlinks) and is what the caller
/// expects it to be.
pub(crate) async fn expect(path: &Path, expected: Expected) -> Result<()> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            exn::bail!(ErrorKind::MissingReference(path.to_path_buf()));
        },
        Err(err) => return Err(err).or_raise(|| ErrorKind::Io(path.to_path_buf())),
    };
    let matches = match expected {
        Expected::File => metadata.is_file(),
        Expected::Directory => metadata.is_dir(),
    };
    if !matches {
        exn::bail!(ErrorKind::ReferenceType { path: path.to_path_buf(), expected });
    }
    Ok(())
}
