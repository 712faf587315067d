#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{ByteRange, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, FileWriter};
use bridge_traits::BridgeError;
use bytes::Bytes;
use core_download::{AudioSource, QueueItem, QueueSnapshot, QueueStore, SongSnapshot};
use futures_util::StreamExt;

#[derive(Clone)]
struct Asset {
    data: Bytes,
    chunk_size: usize,
    chunk_delay: Duration,
    ignore_range: bool,
}

/// In-memory HTTP server for asset transfers.
///
/// Ranged requests are honoured unless the asset says otherwise, and every
/// `(url, offset)` pair is recorded.
#[derive(Default)]
pub struct MemoryHttp {
    assets: Mutex<HashMap<String, Asset>>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl MemoryHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, data: impl Into<Bytes>) {
        self.serve_slow(url, data, 64 * 1024, Duration::ZERO);
    }

    /// Serve `data` in `chunk_size` pieces, waiting `chunk_delay` before each.
    pub fn serve_slow(&self, url: &str, data: impl Into<Bytes>, chunk_size: usize, chunk_delay: Duration) {
        self.assets.lock().unwrap().insert(
            url.to_string(),
            Asset {
                data: data.into(),
                chunk_size,
                chunk_delay,
                ignore_range: false,
            },
        );
    }

    /// Always answer with the full body, whatever the requested offset.
    pub fn ignore_ranges(&self, url: &str) {
        if let Some(asset) = self.assets.lock().unwrap().get_mut(url) {
            asset.ignore_range = true;
        }
    }

    pub fn offsets_for(&self, url: &str) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, offset)| *offset)
            .collect()
    }
}

#[async_trait]
impl HttpClient for MemoryHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(request.url))
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> BridgeResult<ByteRange> {
        self.requests.lock().unwrap().push((url.to_string(), offset));

        let asset = self
            .assets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::Status {
                status: 404,
                url: url.to_string(),
            })?;

        let total = asset.data.len() as u64;
        let start = if asset.ignore_range { 0 } else { offset.min(total) };
        let chunks: Vec<Bytes> = asset.data[start as usize..]
            .chunks(asset.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();
        let delay = asset.chunk_delay;

        let body = futures_util::stream::unfold(chunks.into_iter(), move |mut rest| async move {
            let chunk = rest.next()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Some((Ok(chunk), rest))
        })
        .boxed();

        Ok(ByteRange {
            status: if start > 0 { 206 } else { 200 },
            start,
            total_len: Some(total),
            body,
        })
    }
}

pub fn file_system() -> Arc<TokioFileSystem> {
    Arc::new(TokioFileSystem::new())
}

/// Real filesystem that refuses to write files with a given name.
pub struct FailingFs {
    inner: TokioFileSystem,
    file_name: &'static str,
}

impl FailingFs {
    pub fn rejecting(file_name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: TokioFileSystem::new(),
            file_name,
        })
    }

    fn check(&self, path: &Path) -> BridgeResult<()> {
        if path.file_name().is_some_and(|name| name == self.file_name) {
            return Err(BridgeError::OperationFailed(format!(
                "disk full: {}",
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystemAccess for FailingFs {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        self.inner.exists(path).await
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        self.inner.metadata(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.check(path)?;
        self.inner.write_file(path, data).await
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_dir_all(path).await
    }

    async fn open_write_stream(&self, path: &Path) -> BridgeResult<FileWriter> {
        self.check(path)?;
        self.inner.open_write_stream(path).await
    }

    async fn open_append_stream(&self, path: &Path) -> BridgeResult<FileWriter> {
        self.check(path)?;
        self.inner.open_append_stream(path).await
    }
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn song(id: &str, audio_url: &str) -> QueueItem {
    QueueItem::new(
        id,
        SongSnapshot::new(format!("Song {}", id), "Test Artist")
            .duration_secs(180)
            .audio(AudioSource::new(audio_url, "mp3").with_bitrate(320)),
    )
}

/// Wait until `pred` holds for the store snapshot, or panic after `limit`.
pub async fn wait_until<F>(store: &QueueStore, limit: Duration, mut pred: F) -> QueueSnapshot
where
    F: FnMut(&QueueSnapshot) -> bool,
{
    let mut rx = store.subscribe();
    let waited = tokio::time::timeout(limit, async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                panic!("queue store dropped");
            }
        }
    })
    .await;

    match waited {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("condition not reached within {:?}: {:?}", limit, store.snapshot()),
    }
}
