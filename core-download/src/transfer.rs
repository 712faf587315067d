//! # Resumable Transfer
//!
//! Streams one HTTP asset to disk with pause, resume and abort.
//!
//! A [`TransferControl`] is shared between the pipeline and the orchestrator:
//!
//! - `pause()` drops the open response stream once the current chunk is
//!   written; the transfer then waits without holding a connection.
//! - `resume()` reopens the resource with a ranged request at the number of
//!   bytes already on disk and appends to the file. A server that ignores the
//!   range restarts the file from zero.
//! - `abort()` ends the transfer with [`DownloadError::Transfer`], paused or
//!   not.

use std::path::Path;
use std::sync::Arc;

use bridge_traits::http::HttpClient;
use bridge_traits::storage::{FileSystemAccess, FileWriter};
use core_async::io::AsyncWriteExt;
use core_async::sync::{watch, CancellationToken};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Result};

/// Pause/abort handle for one pipeline run.
#[derive(Clone, Debug)]
pub struct TransferControl {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for TransferControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(paused),
        }
    }

    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Resolves once [`abort`](Self::abort) is called.
    pub async fn aborted(&self) {
        self.cancel.cancelled().await
    }

    /// Resolves once the control is paused.
    async fn paused(&self) {
        let mut rx = self.paused.subscribe();
        let closed = rx.wait_for(|paused| *paused).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Wait until not paused. Fails when aborted first.
    async fn wait_resumed(&self) -> Result<()> {
        let mut rx = self.paused.subscribe();
        core_async::select! {
            _ = self.cancel.cancelled() => Err(DownloadError::aborted()),
            resumed = async { rx.wait_for(|paused| !*paused).await.map(|_| ()) } => {
                resumed.map_err(|_| DownloadError::aborted())
            }
        }
    }
}

pub struct ResumableTransfer {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
}

enum Segment {
    Finished,
    Paused,
}

impl ResumableTransfer {
    pub fn new(http_client: Arc<dyn HttpClient>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            http_client,
            file_system,
        }
    }

    /// Download `url` into `dest`, reporting raw progress in `[0, 1]`.
    ///
    /// Progress is only reported when the server announces a length, and
    /// `1.0` is always reported on success. Returns the bytes written.
    pub async fn run(
        &self,
        url: &str,
        dest: &Path,
        control: &TransferControl,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<u64> {
        let mut written = 0u64;
        let mut total = None;
        let mut segments = 0u32;

        loop {
            if control.is_aborted() {
                return Err(DownloadError::aborted());
            }
            control.wait_resumed().await?;

            segments += 1;
            match self
                .segment(url, dest, control, &mut written, &mut total, on_progress)
                .await?
            {
                Segment::Finished => break,
                Segment::Paused => {
                    info!(url, offset = written, "Transfer paused");
                    control.wait_resumed().await?;
                    info!(url, offset = written, "Transfer resuming");
                }
            }
        }

        on_progress(1.0);
        debug!(url, bytes = written, segments, "Transfer complete");
        Ok(written)
    }

    /// One request/stream cycle starting at `written`.
    async fn segment(
        &self,
        url: &str,
        dest: &Path,
        control: &TransferControl,
        written: &mut u64,
        total: &mut Option<u64>,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<Segment> {
        let range = core_async::select! {
            _ = control.aborted() => return Err(DownloadError::aborted()),
            range = self.http_client.fetch_range(url, *written) => {
                range.map_err(|e| DownloadError::Transfer(format!("{}: {}", url, e)))?
            }
        };

        let mut writer = if *written == 0 {
            self.open(dest, false).await?
        } else if range.start == *written {
            self.open(dest, true).await?
        } else if range.start == 0 {
            warn!(url, offset = *written, "Server ignored range request, restarting");
            *written = 0;
            self.open(dest, false).await?
        } else {
            return Err(DownloadError::Transfer(format!(
                "{}: expected body at offset {}, server sent {}",
                url, written, range.start
            )));
        };

        if range.total_len.is_some() {
            *total = range.total_len;
        }

        let mut body = range.body;
        let outcome = loop {
            core_async::select! {
                biased;
                _ = control.aborted() => return Err(DownloadError::aborted()),
                _ = control.paused() => break Segment::Paused,
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        writer
                            .write_all(&bytes)
                            .await
                            .map_err(|e| DownloadError::Filesystem(format!("{}: {}", dest.display(), e)))?;
                        *written += bytes.len() as u64;
                        if let Some(total) = *total {
                            if total > 0 {
                                on_progress((*written as f64 / total as f64).min(1.0));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(DownloadError::Transfer(format!("{}: {}", url, e)));
                    }
                    None => break Segment::Finished,
                },
            }
        };

        close(&mut writer, dest).await?;

        if let (Segment::Finished, Some(expected)) = (&outcome, *total) {
            if *written < expected {
                return Err(DownloadError::Transfer(format!(
                    "{}: stream ended at {} of {} bytes",
                    url, written, expected
                )));
            }
        }

        Ok(outcome)
    }

    async fn open(&self, dest: &Path, append: bool) -> Result<FileWriter> {
        let opened = if append {
            self.file_system.open_append_stream(dest).await
        } else {
            self.file_system.open_write_stream(dest).await
        };
        opened.map_err(|e| DownloadError::Filesystem(format!("{}: {}", dest.display(), e)))
    }
}

async fn close(writer: &mut FileWriter, dest: &Path) -> Result<()> {
    writer
        .shutdown()
        .await
        .map_err(|e| DownloadError::Filesystem(format!("{}: {}", dest.display(), e)))
}
