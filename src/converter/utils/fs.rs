//! File system utilities for conversion outputs.
//!
//! Blocking archive work runs on the blocking pool through [`blocking`]; file
//! moves into the output directory go through [`move_file`] so a half-written
//! artifact never appears under its final name.

use crate::converter::error::{Error, ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Runs blocking work (zip reading and writing) on the blocking thread pool.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::GenericError(format!("blocking task panicked: {e}")))?
}

/// Moves a finished file to `to`, replacing whatever is there.
///
/// Tries a rename first. Across file systems the file is copied to a hidden
/// sibling of `to` and renamed from there, so `to` only ever holds a
/// complete file.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }

    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    let file_name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = to.with_file_name(format!(".{file_name}.partial"));
    if let Err(e) = fs::copy(from, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e).fs_context("copying artifact", from);
    }
    fs::rename(&staging, to)
        .await
        .fs_context("installing artifact", to)?;
    remove_file(from).await
}

/// Removes a file if it exists.
pub async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing file", path),
    }
}

/// Size of a file in bytes.
pub async fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?
        .len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn move_file_replaces_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("work/app.aab");
        let to = tmp.path().join("out/app.aab");
        std::fs::create_dir_all(from.parent().unwrap()).unwrap();
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        move_file(&from, &to).await.unwrap();

        assert_eq!(std::fs::read(&to).unwrap(), b"new");
        assert!(!from.exists());
    }

    #[tokio::test]
    async fn remove_file_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        remove_file(&tmp.path().join("missing")).await.unwrap();
    }
}
