//! Lazy depth-first listing of the files below a directory.

use crate::error::{Error, ErrorKind, Result};
use async_stream::stream;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, DirEntry};

pub type FileStream = Pin<Box<dyn Stream<Item = Result<PathBuf>> + Send>>;

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

fn io_error(err: std::io::Error, path: &Path) -> Error {
    exn::Exn::from(err).raise(ErrorKind::Io(path.to_path_buf()))
}

async fn classify(entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    let file_type = entry.file_type().await.map_err(|err| io_error(err, &path))?;
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(path));
    }
    if file_type.is_symlink() {
        // Links count when they resolve to a file. Directories behind links
        // are not descended into, which also rules out cycles.
        return Ok(match fs::metadata(&path).await {
            Ok(target) if target.is_file() => WalkEntry::File(path),
            Ok(_) => {
                tracing::debug!(path = %path.display(), "Skipping symlink to a non-file");
                WalkEntry::Skip
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Skipping broken symlink");
                WalkEntry::Skip
            },
        });
    }
    tracing::debug!(path = %path.display(), "Skipping special file");
    Ok(WalkEntry::Skip)
}

/// Every file below `root`, yielded as it is discovered.
///
/// Sub-directories are descended but never yielded themselves. Order is
/// depth-first but otherwise whatever the filesystem returns.
pub fn walk(root: impl Into<PathBuf>) -> FileStream {
    let mut stack = vec![root.into()];
    Box::pin(stream! {
        'dirs: while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(io_error(err, &current));
                    continue 'dirs;
                },
            };
            'entries: loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break 'entries,
                    Err(err) => {
                        yield Err(io_error(err, &current));
                        continue 'dirs;
                    },
                };
                match classify(entry).await {
                    Ok(WalkEntry::File(path)) => yield Ok(path),
                    Ok(WalkEntry::Descend(path)) => stack.push(path),
                    Ok(WalkEntry::Skip) => {},
                    Err(err) => yield Err(err),
                }
            }
        }
    })
}
