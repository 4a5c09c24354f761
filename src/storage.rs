//! Filesystem helpers for the uploads/ and processed/ directories.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::ErrorKind as StdIoErrorKind;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, warn};

const MAX_FILENAME_LEN: usize = 255;

/// Lower-cased extension of `name`, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `allowed` is expected lower-cased, see `Config::normalized_extensions`
pub fn is_allowed_extension(name: &str, allowed: &[String]) -> bool {
    extension_of(name).is_some_and(|ext| allowed.iter().any(|a| *a == ext))
}

/// A single path component that stays inside the directory it is joined to
/// and can be quoted in a `Content-Disposition` header as-is
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FILENAME_LEN
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.chars().any(|c| c.is_control() || c == '"')
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("File exceeds the maximum allowed size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Failed to read upload body: {0}")]
    Body(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stream `body` into `path`, giving up once more than `limit` bytes arrive.
///
/// On any error the partially written file is removed.
pub async fn write_limited<S, E>(body: S, path: &Path, limit: u64) -> Result<u64, WriteError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let result = write_stream(body, path, limit).await;
    if let Err(error) = &result {
        debug!(?path, %error, "Removing partial upload");
        _ = tokio::fs::remove_file(path).await;
    }
    result
}

async fn write_stream<S, E>(body: S, path: &Path, limit: u64) -> Result<u64, WriteError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = std::pin::pin!(body);
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|error| WriteError::Body(error.to_string()))?;
        written += chunk.len() as u64;
        if written > limit {
            warn!(?path, written, limit, "Upload size limit exceeded, aborting");
            return Err(WriteError::TooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

/// Remove every entry inside `dir`, keeping `dir` itself.
///
/// Symlinks are unlinked, never followed. A missing directory counts as empty.
pub async fn clear_dir(dir: &Path) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == StdIoErrorKind::NotFound => return Ok(0),
        Err(error) => return Err(error),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };

        match result {
            Ok(()) => removed += 1,
            // raced with another cleanup or a failed trim removing its .part file
            Err(error) if error.kind() == StdIoErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
    }

    debug!(?dir, removed, "Directory cleared");
    Ok(removed)
}
