//! Queue item model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One downloadable audio rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub url: String,
    /// File extension to store the asset under (`mp3`, `m4a`, ...)
    pub format: String,
    pub bitrate_kbps: Option<u32>,
}

impl AudioSource {
    pub fn new(url: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
            bitrate_kbps: None,
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }
}

/// Source metadata captured at enqueue time. Never changes afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSnapshot {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
    pub audio_sources: Vec<AudioSource>,
    pub cover_urls: Vec<String>,
}

impl SongSnapshot {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Self::default()
        }
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn duration_secs(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn audio(mut self, source: AudioSource) -> Self {
        self.audio_sources.push(source);
        self
    }

    pub fn cover(mut self, url: impl Into<String>) -> Self {
        self.cover_urls.push(url.into());
        self
    }

    /// Highest-bitrate source with a non-blank URL; the first listed wins ties
    /// and sources without a bitrate rank last.
    pub fn best_audio_source(&self) -> Option<&AudioSource> {
        self.audio_sources
            .iter()
            .filter(|s| !s.url.trim().is_empty())
            .fold(None, |best: Option<&AudioSource>, candidate| match best {
                Some(b) if b.bitrate_kbps >= candidate.bitrate_kbps => Some(b),
                _ => Some(candidate),
            })
    }

    /// First non-blank cover URL.
    pub fn cover_url(&self) -> Option<&str> {
        self.cover_urls
            .iter()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses under which an item may hold a pipeline token.
    pub fn holds_run(&self) -> bool {
        matches!(self, Self::Pending | Self::Downloading | Self::Paused)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a committed song lands in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementHint {
    pub collection_id: String,
    /// Position of the first enqueued item; later items of the same batch
    /// follow it. `None` appends.
    pub sort_order: Option<i64>,
}

impl PlacementHint {
    pub fn append_to(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            sort_order: None,
        }
    }

    pub fn at(collection_id: impl Into<String>, sort_order: i64) -> Self {
        Self {
            collection_id: collection_id.into(),
            sort_order: Some(sort_order),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Also the id of the catalog entity the item turns into
    pub id: String,
    pub song: SongSnapshot,
    pub status: QueueStatus,
    /// Composite pipeline progress in `[0, 1]`
    pub progress: f64,
    pub stage_label: String,
    /// Set only while `status` is `Failed`
    pub error: Option<String>,
    pub target_collection_id: Option<String>,
    pub sort_order: Option<i64>,
    /// Unix millis
    pub enqueued_at: u64,
    /// Assigned by the store on acceptance; tells a re-enqueued id apart from
    /// the item it replaced
    #[serde(default)]
    pub ticket: u64,
}

impl QueueItem {
    pub fn new(id: impl Into<String>, song: SongSnapshot) -> Self {
        Self {
            id: id.into(),
            song,
            status: QueueStatus::Pending,
            progress: 0.0,
            stage_label: "Queued".to_string(),
            error: None,
            target_collection_id: None,
            sort_order: None,
            enqueued_at: core_async::time::now_millis(),
            ticket: 0,
        }
    }

    /// New item with a random id.
    pub fn from_song(song: SongSnapshot) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), song)
    }

    pub fn placed_in(mut self, collection_id: impl Into<String>, sort_order: Option<i64>) -> Self {
        self.target_collection_id = Some(collection_id.into());
        self.sort_order = sort_order;
        self
    }
}

/// Partial update applied by [`QueueStore::mutate`](crate::store::QueueStore::mutate).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueItemUpdate {
    pub status: Option<QueueStatus>,
    pub progress: Option<f64>,
    pub stage_label: Option<String>,
    /// `Some(None)` clears the error
    pub error: Option<Option<String>>,
}

impl QueueItemUpdate {
    pub fn status(mut self, status: QueueStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stage(mut self, label: impl Into<String>) -> Self {
        self.stage_label = Some(label.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(Some(message.into()));
        self
    }

    /// Apply to `item`. Returns whether anything changed.
    ///
    /// Progress never decreases here: resetting it is reserved for retry. The
    /// error is dropped whenever the resulting status is not `Failed`.
    pub(crate) fn apply(&self, item: &mut QueueItem) -> bool {
        let before = item.clone();

        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(progress) = self.progress {
            let progress = if progress.is_finite() {
                progress.clamp(0.0, 1.0)
            } else {
                item.progress
            };
            item.progress = item.progress.max(progress);
        }
        if let Some(label) = &self.stage_label {
            item.stage_label.clone_from(label);
        }
        if let Some(error) = &self.error {
            item.error.clone_from(error);
        }
        if item.status != QueueStatus::Failed {
            item.error = None;
        }

        *item != before
    }
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub downloading: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        let mut stats = Self::default();
        for item in items {
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Downloading => stats.downloading += 1,
                QueueStatus::Paused => stats.paused += 1,
                QueueStatus::Completed => stats.completed += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.pending + self.downloading + self.paused + self.completed + self.failed
    }

    /// Nothing waiting and nothing running.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.downloading == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_audio_source_prefers_bitrate_then_order() {
        let song = SongSnapshot::new("t", "a")
            .audio(AudioSource::new("", "flac").with_bitrate(1411))
            .audio(AudioSource::new("http://x/128.mp3", "mp3").with_bitrate(128))
            .audio(AudioSource::new("http://x/320.mp3", "mp3").with_bitrate(320))
            .audio(AudioSource::new("http://x/320.m4a", "m4a").with_bitrate(320));

        assert_eq!(song.best_audio_source().unwrap().url, "http://x/320.mp3");
        assert!(SongSnapshot::new("t", "a").best_audio_source().is_none());
    }

    #[test]
    fn test_cover_url_skips_blank() {
        let song = SongSnapshot::new("t", "a").cover(" ").cover("http://x/c.jpg");
        assert_eq!(song.cover_url(), Some("http://x/c.jpg"));
    }

    #[test]
    fn test_update_keeps_progress_monotonic() {
        let mut item = QueueItem::new("a", SongSnapshot::new("t", "a"));
        assert!(QueueItemUpdate::default().progress(0.5).apply(&mut item));
        assert!(!QueueItemUpdate::default().progress(0.3).apply(&mut item));
        assert_eq!(item.progress, 0.5);

        QueueItemUpdate::default().progress(7.0).apply(&mut item);
        assert_eq!(item.progress, 1.0);
    }

    #[test]
    fn test_update_clears_error_outside_failed() {
        let mut item = QueueItem::new("a", SongSnapshot::new("t", "a"));
        QueueItemUpdate::default()
            .status(QueueStatus::Failed)
            .error("boom")
            .apply(&mut item);
        assert_eq!(item.error.as_deref(), Some("boom"));

        QueueItemUpdate::default()
            .status(QueueStatus::Pending)
            .apply(&mut item);
        assert!(item.error.is_none());
    }

    #[test]
    fn test_stats() {
        let mut done = QueueItem::new("b", SongSnapshot::default());
        done.status = QueueStatus::Completed;
        let items = vec![QueueItem::new("a", SongSnapshot::default()), done];

        let stats = QueueStats::from_items(&items);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total(), 2);
        assert!(!stats.is_idle());
    }
}
