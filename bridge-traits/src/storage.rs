//! Host filesystem seam.
//!
//! The download pipeline only needs a handful of operations: prepare an item
//! directory, stream bytes into it, write small text assets, and remove the
//! directory again on rollback.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    /// Unix seconds
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// Sink for streamed asset bytes.
pub type FileWriter = Box<dyn core_async::io::AsyncWrite + Send + Unpin>;

/// Paths are absolute and always inside the configured music directory.
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stage(fs: &dyn FileSystemAccess, dir: &Path, lrc: &str) -> Result<()> {
///     fs.create_dir_all(dir).await?;
///     fs.write_file(&dir.join("lyrics.lrc"), lrc.to_owned().into()).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// `mkdir -p`
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Replace the file's content with `data`.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Recursive delete; succeeds when the directory is already gone.
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Fresh file for a transfer starting at offset zero.
    async fn open_write_stream(&self, path: &Path) -> Result<FileWriter>;

    /// Continue a partial transfer at the current end of the file.
    async fn open_append_stream(&self, path: &Path) -> Result<FileWriter>;

    /// Bytes already on disk; 0 for a missing file.
    async fn file_size(&self, path: &Path) -> Result<u64> {
        if self.exists(path).await? {
            Ok(self.metadata(path).await?.size)
        } else {
            Ok(0)
        }
    }
}
