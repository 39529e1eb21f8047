//! Putting files into the library with the configured method.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use super::PostProcessError;
use crate::config::ProcessMethod;

const BUFFER_SIZE: usize = 256 * 1024;

/// Place `source` at `destination`, replacing an existing destination file.
/// Parent directories are created. Returns the number of bytes placed.
///
/// The file is first placed at a sibling temp path and renamed over the
/// destination only once that succeeded, so a failed placement leaves an
/// existing destination untouched.
pub async fn place_file(
    source: &Path,
    destination: &Path,
    method: ProcessMethod,
) -> Result<u64, PostProcessError> {
    let meta = fs::metadata(source)
        .await
        .map_err(|_| PostProcessError::SourceNotFound(source.to_path_buf()))?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PostProcessError::placement(destination, e))?;
    }

    let staging = staging_path(destination);
    if fs::symlink_metadata(&staging).await.is_ok() {
        fs::remove_file(&staging)
            .await
            .map_err(|e| PostProcessError::placement(&staging, e))?;
    }

    let copied = match stage(source, &staging, method).await {
        Ok(copied) => copied,
        Err(e) => {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&staging, destination).await {
        let _ = fs::remove_file(&staging).await;
        return Err(PostProcessError::placement(destination, e));
    }

    // a cross-device move copied the file; drop the source only now
    if copied {
        fs::remove_file(source)
            .await
            .map_err(|e| PostProcessError::placement(source, e))?;
    }

    Ok(meta.len())
}

/// `<dest>.medusa-tmp` next to the destination.
fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".medusa-tmp");
    destination.with_file_name(name)
}

/// Put `source` at `staging`. Returns true when a move fell back to a copy
/// and the source still has to be removed.
async fn stage(
    source: &Path,
    staging: &Path,
    method: ProcessMethod,
) -> Result<bool, PostProcessError> {
    match method {
        ProcessMethod::Move => {
            if try_rename(source, staging)
                .await
                .map_err(|e| PostProcessError::placement(staging, e))?
            {
                return Ok(false);
            }
            debug!(source = %source.display(), "Cross-device move, copying instead");
            copy_verified(source, staging).await?;
            Ok(true)
        }
        ProcessMethod::Copy => {
            copy_verified(source, staging).await?;
            Ok(false)
        }
        ProcessMethod::Hardlink => {
            fs::hard_link(source, staging)
                .await
                .map_err(|e| PostProcessError::placement(staging, e))?;
            Ok(false)
        }
        ProcessMethod::Symlink => {
            symlink(source, staging)
                .await
                .map_err(|e| PostProcessError::placement(staging, e))?;
            Ok(false)
        }
    }
}

/// Rename; `Ok(false)` when source and destination are on different devices.
async fn try_rename(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        // EXDEV is 18 on Linux
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
async fn symlink(source: &Path, destination: &Path) -> Result<(), std::io::Error> {
    let target = fs::canonicalize(source).await?;
    fs::symlink(target, destination).await
}

#[cfg(windows)]
async fn symlink(source: &Path, destination: &Path) -> Result<(), std::io::Error> {
    let target = fs::canonicalize(source).await?;
    fs::symlink_file(target, destination).await
}

/// Copy and compare SHA-256 digests of source and copy.
async fn copy_verified(source: &Path, destination: &Path) -> Result<(), PostProcessError> {
    let source_file = File::open(source)
        .await
        .map_err(|e| PostProcessError::placement(source, e))?;
    let dest_file = File::create(destination)
        .await
        .map_err(|e| PostProcessError::placement(destination, e))?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| PostProcessError::placement(source, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(|e| PostProcessError::placement(destination, e))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| PostProcessError::placement(destination, e))?;

    let expected = format!("{:x}", hasher.finalize());
    let actual = checksum(destination).await?;
    if expected != actual {
        let _ = fs::remove_file(destination).await;
        return Err(PostProcessError::ChecksumMismatch {
            path: destination.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

async fn checksum(path: &Path) -> Result<String, PostProcessError> {
    let file = File::open(path)
        .await
        .map_err(|e| PostProcessError::placement(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| PostProcessError::placement(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Remove empty directories below `root` (never `root` itself), deepest
/// first. Returns how many were removed.
pub async fn remove_empty_dirs(root: &Path) -> usize {
    let mut dirs = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                stack.push(entry.path());
                dirs.push(entry.path());
            }
        }
    }

    // deeper paths sort after their parents
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    let mut removed = 0;
    for dir in dirs {
        // remove_dir only succeeds on empty directories
        if fs::remove_dir(&dir).await.is_ok() {
            removed += 1;
        }
    }
    removed
}
