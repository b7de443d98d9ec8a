//! Media directory management.
//!
//! Uploads land in a single flat directory under UUID-based names; upscaled
//! results sit next to them with an `upscaled_` prefix. Public URLs are the
//! configured base URL followed by the filename.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StorageError;

/// Extension used when the uploaded filename has none.
pub const FALLBACK_EXTENSION: &str = "png";

/// Prefix given to upscaled results.
pub const UPSCALED_PREFIX: &str = "upscaled_";

/// An image as received from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied filename, if any.
    pub file_name: Option<String>,
    /// Raw file contents.
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(file_name: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name,
            data: data.into(),
        }
    }

    /// Lowercased extension of the client filename, or [`FALLBACK_EXTENSION`].
    pub fn extension(&self) -> String {
        extension_of(self.file_name.as_deref())
    }
}

/// Lowercased extension of a client filename, or [`FALLBACK_EXTENSION`].
///
/// Only the final path component is considered and only ASCII
/// alphanumeric extensions are accepted.
pub fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// A file that is deleted when dropped, unless it was committed.
///
/// Covers every way a write can end early: an I/O error, a failed source
/// stream, or the owning future being dropped by a timeout.
#[derive(Debug)]
pub(crate) struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand back its path.
    pub(crate) fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed partial file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove partial file {:?}: {}", self.path, e),
        }
    }
}

/// An upload being written to the media directory chunk by chunk.
///
/// Dropping it before [`PendingUpload::finish`] removes the file.
#[derive(Debug)]
pub struct PendingUpload {
    file: tokio::fs::File,
    guard: PartialFile,
    filename: String,
    url: String,
    written: u64,
}

impl PendingUpload {
    /// Append one chunk.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|source| StorageError::Write {
                path: self.guard.path().to_path_buf(),
                source,
            })?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Flush and keep the file.
    pub async fn finish(mut self) -> Result<StoredFile, StorageError> {
        self.file
            .flush()
            .await
            .map_err(|source| StorageError::Write {
                path: self.guard.path().to_path_buf(),
                source,
            })?;
        tracing::debug!("Stored upload as {} ({} bytes)", self.filename, self.written);
        Ok(StoredFile {
            path: self.guard.commit(),
            url: self.url,
            filename: self.filename,
        })
    }
}

/// A file inside the media directory together with its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
}

/// Flat media directory with URL mapping.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    /// Create a new `MediaStorage` rooted at `root`, publishing files under `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create the media directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.root.clone(),
                source,
            })
    }

    /// Public URL for a file in the media directory.
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}{}", self.base_url, filename)
    }

    /// Open a fresh `<uuid>.<ext>` file for an upload that arrives in chunks.
    pub async fn create_upload(&self, extension: &str) -> Result<PendingUpload, StorageError> {
        self.ensure_root().await?;

        let filename = input_filename(extension);
        let guard = PartialFile::new(self.root.join(&filename));
        let file = tokio::fs::File::create(guard.path())
            .await
            .map_err(|source| StorageError::Write {
                path: guard.path().to_path_buf(),
                source,
            })?;

        Ok(PendingUpload {
            file,
            url: self.url_for(&filename),
            guard,
            filename,
            written: 0,
        })
    }

    /// Persist an in-memory upload under a fresh `<uuid>.<ext>` name.
    pub async fn save_upload(&self, upload: &UploadedImage) -> Result<StoredFile, StorageError> {
        let mut pending = self.create_upload(&upload.extension()).await?;
        pending.write(&upload.data).await?;
        pending.finish().await
    }

    /// Move a backend output into the media directory as
    /// `upscaled_<input filename>`.
    ///
    /// Falls back to copy-and-delete when a plain rename fails, which is the
    /// case when the backend wrote to another filesystem.
    pub async fn adopt(
        &self,
        output: &Path,
        input_filename: &str,
    ) -> Result<StoredFile, StorageError> {
        if input_filename.is_empty() || input_filename.contains(['/', '\\']) {
            return Err(StorageError::InvalidPath(PathBuf::from(input_filename)));
        }

        let filename = output_filename(input_filename);
        let target = self.root.join(&filename);

        if output == target {
            return Ok(self.stored(filename));
        }

        if let Err(rename_err) = tokio::fs::rename(output, &target).await {
            tracing::debug!(
                "Rename {:?} -> {:?} failed ({}), copying instead",
                output,
                target,
                rename_err
            );
            self.copy_then_remove(output, &target).await?;
        }

        Ok(self.stored(filename))
    }

    /// Relocate across filesystems, where `rename` is not possible.
    async fn copy_then_remove(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        tokio::fs::copy(from, to)
            .await
            .map_err(|source| StorageError::Relocate {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
        self.remove(from).await;
        Ok(())
    }

    /// Delete a file, logging instead of failing.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
        }
    }

    fn stored(&self, filename: String) -> StoredFile {
        StoredFile {
            path: self.root.join(&filename),
            url: self.url_for(&filename),
            filename,
        }
    }
}

/// Generate a unique `<uuid>.<ext>` filename.
pub fn input_filename(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Name of the upscaled counterpart of `input_filename`.
pub fn output_filename(input_filename: &str) -> String {
    format!("{UPSCALED_PREFIX}{input_filename}")
}
