//! Tokio-backed [`FileSystemAccess`] for desktop hosts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::storage::{FileMetadata, FileSystemAccess, FileWriter};
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

/// Where the library lives when the host does not say: the platform data
/// directory (`~/.local/share/tunevault` on Linux).
pub fn default_library_root() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("tunevault")
}

/// Stateless; writers create missing parent directories.
#[derive(Debug, Default, Clone)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent).await?),
        _ => Ok(()),
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let meta = fs::metadata(path).await?;
        let modified_at = meta
            .modified()
            .ok()
            .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_secs() as i64);

        Ok(FileMetadata {
            size: meta.len(),
            modified_at,
            is_directory: meta.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path).await?)
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        ensure_parent(path).await?;
        fs::write(path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "File written");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn open_write_stream(&self, path: &Path) -> Result<FileWriter> {
        ensure_parent(path).await?;
        Ok(Box::new(fs::File::create(path).await?))
    }

    async fn open_append_stream(&self, path: &Path) -> Result<FileWriter> {
        ensure_parent(path).await?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::io::AsyncWriteExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_metadata() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("music").join("song-1").join("lyrics.lrc");

        fs.write_file(&path, Bytes::from("[00:01.00]hello"))
            .await
            .unwrap();

        assert!(fs.exists(&path).await.unwrap());
        assert_eq!(fs.metadata(&path).await.unwrap().size, 15);
        assert_eq!(fs.file_size(&path).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_append_stream_continues_existing_file() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("audio.mp3");

        let mut writer = fs.open_write_stream(&path).await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        let mut writer = fs.open_append_stream(&path).await.unwrap();
        writer.write_all(b"def").await.unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_delete_missing_directory_is_ok() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let target = dir.path().join("music").join("gone");

        fs.delete_dir_all(&target).await.unwrap();

        fs.create_dir_all(&target).await.unwrap();
        fs.delete_dir_all(&target).await.unwrap();
        assert!(!fs.exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_size_is_zero() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();

        assert_eq!(fs.file_size(&dir.path().join("nope")).await.unwrap(), 0);
    }

    #[test]
    fn test_default_library_root_is_namespaced() {
        assert!(default_library_root().ends_with("tunevault"));
    }
}
