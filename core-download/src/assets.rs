//! Staged assets and on-disk layout of one item.
//!
//! ```text
//! music/{id}/audio.{format}
//! music/{id}/cover.jpg    (only with a cover URL)
//! music/{id}/lyrics.lrc   (only when a lyrics candidate won)
//! ```

use std::path::{Component, Path, PathBuf};

use crate::error::{DownloadError, Result};
use crate::queue::QueueItem;

pub const AUDIO_FILE_STEM: &str = "audio";
pub const COVER_FILE_NAME: &str = "cover.jpg";
pub const LYRICS_FILE_NAME: &str = "lyrics.lrc";

/// Used when a source carries no usable format.
pub const FALLBACK_AUDIO_FORMAT: &str = "mp3";

/// Resolved inputs of one pipeline run, independent of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAssets {
    pub audio_url: String,
    pub audio_format: String,
    pub cover_url: Option<String>,
    /// Filled in once the lyrics race has a winner
    pub lyrics: Option<StagedLyrics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLyrics {
    pub text: String,
    pub source: String,
    pub is_synced: bool,
}

impl StagedAssets {
    /// Pick the best audio source and the first cover of `item`.
    pub fn resolve(item: &QueueItem) -> Result<Self> {
        let source = item
            .song
            .best_audio_source()
            .ok_or_else(|| DownloadError::MissingSourceUrl {
                item_id: item.id.clone(),
            })?;

        Ok(Self {
            audio_url: source.url.trim().to_string(),
            audio_format: sanitize_format(&source.format),
            cover_url: item.song.cover_url().map(str::to_string),
            lyrics: None,
        })
    }
}

/// Lowercase alphanumeric extension without a leading dot.
fn sanitize_format(format: &str) -> String {
    let cleaned: String = format
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if cleaned.is_empty() {
        FALLBACK_AUDIO_FORMAT.to_string()
    } else {
        cleaned
    }
}

/// Reject ids that would not land in their own directory below `music/`:
/// empty, `.`/`..`, or containing a path separator.
pub fn validate_item_id(item_id: &str) -> Result<()> {
    let mut components = Path::new(item_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == item_id
    );

    if single_normal && !item_id.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(DownloadError::InvalidItemId {
            item_id: item_id.to_string(),
        })
    }
}

/// Paths of one item's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLayout {
    pub dir: PathBuf,
}

impl ItemLayout {
    pub fn new(music_dir: &Path, item_id: &str) -> Result<Self> {
        validate_item_id(item_id)?;
        Ok(Self {
            dir: music_dir.join(item_id),
        })
    }

    pub fn audio_path(&self, format: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", AUDIO_FILE_STEM, format))
    }

    pub fn cover_path(&self) -> PathBuf {
        self.dir.join(COVER_FILE_NAME)
    }

    pub fn lyrics_path(&self) -> PathBuf {
        self.dir.join(LYRICS_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{AudioSource, SongSnapshot};

    #[test]
    fn test_resolve_picks_source_and_cover() {
        let item = QueueItem::new(
            "id-1",
            SongSnapshot::new("t", "a")
                .audio(AudioSource::new(" http://x/a.m4a ", ".M4A"))
                .cover("http://x/c.jpg"),
        );

        let staged = StagedAssets::resolve(&item).unwrap();
        assert_eq!(staged.audio_url, "http://x/a.m4a");
        assert_eq!(staged.audio_format, "m4a");
        assert_eq!(staged.cover_url.as_deref(), Some("http://x/c.jpg"));
    }

    #[test]
    fn test_resolve_without_source_fails() {
        let item = QueueItem::new("id-2", SongSnapshot::new("t", "a"));
        assert!(matches!(
            StagedAssets::resolve(&item),
            Err(DownloadError::MissingSourceUrl { ref item_id }) if item_id == "id-2"
        ));
    }

    #[test]
    fn test_format_fallback_and_layout() {
        assert_eq!(sanitize_format("  "), "mp3");

        let layout = ItemLayout::new(Path::new("/lib/music"), "id-3").unwrap();
        assert_eq!(layout.audio_path("flac"), PathBuf::from("/lib/music/id-3/audio.flac"));
        assert_eq!(layout.cover_path(), PathBuf::from("/lib/music/id-3/cover.jpg"));
        assert_eq!(layout.lyrics_path(), PathBuf::from("/lib/music/id-3/lyrics.lrc"));
    }

    #[test]
    fn test_layout_rejects_ids_outside_music_dir() {
        let music = Path::new("/lib/music");
        for id in ["", ".", "..", "a/b", "../x", "/abs", "a\\b"] {
            assert!(
                matches!(
                    ItemLayout::new(music, id),
                    Err(DownloadError::InvalidItemId { ref item_id }) if item_id == id
                ),
                "{:?} accepted",
                id
            );
        }
        assert!(validate_item_id("song..1").is_ok());
        assert!(validate_item_id(".hidden").is_ok());
    }
}
