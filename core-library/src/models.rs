//! Domain models for the song catalog

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

use crate::error::{LibraryError, Result};

/// One lyric line. `time_ms` is `None` for plain (unsynced) lyrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_ms: Option<u64>,
    pub text: String,
}

impl LyricLine {
    pub fn timed(time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            time_ms: Some(time_ms),
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            time_ms: None,
            text: text.into(),
        }
    }
}

/// A fully materialized library entry, created once per successful download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntity {
    /// Equal to the queue item id that produced it
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
    pub audio_path: PathBuf,
    /// File extension of the audio asset (`mp3`, `m4a`, ...)
    pub audio_format: String,
    pub cover_path: Option<PathBuf>,
    pub lyrics: Vec<LyricLine>,
    /// Provider label of the lyrics that were kept
    pub lyrics_source: Option<String>,
    /// Unix seconds
    pub added_at: i64,
}

impl SongEntity {
    /// True when at least one lyric line carries a timestamp.
    pub fn has_synced_lyrics(&self) -> bool {
        self.lyrics.iter().any(|line| line.time_ms.is_some())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LibraryError::invalid("id", "cannot be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(LibraryError::invalid("title", "cannot be empty"));
        }
        if self.audio_path.as_os_str().is_empty() {
            return Err(LibraryError::invalid("audio_path", "cannot be empty"));
        }
        Ok(())
    }
}

/// A song's position inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CollectionEntry {
    pub collection_id: String,
    pub song_id: String,
    pub sort_order: i64,
    pub added_at: i64,
}

/// Row shape of the `songs` table.
#[derive(Debug, FromRow)]
pub(crate) struct SongRow {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub audio_path: String,
    pub audio_format: String,
    pub cover_path: Option<String>,
    pub lyrics_source: Option<String>,
    pub added_at: i64,
}

/// Row shape of the `song_lyrics` table.
#[derive(Debug, FromRow)]
pub(crate) struct LyricRow {
    pub time_ms: Option<i64>,
    pub text: String,
}

impl SongRow {
    pub(crate) fn into_entity(self, lyrics: Vec<LyricRow>) -> SongEntity {
        SongEntity {
            id: self.id,
            title: self.title,
            artist: self.artist,
            album: self.album,
            duration_secs: self.duration_secs.and_then(|d| u32::try_from(d).ok()),
            audio_path: PathBuf::from(self.audio_path),
            audio_format: self.audio_format,
            cover_path: self.cover_path.map(PathBuf::from),
            lyrics: lyrics
                .into_iter()
                .map(|row| LyricLine {
                    time_ms: row.time_ms.and_then(|t| u64::try_from(t).ok()),
                    text: row.text,
                })
                .collect(),
            lyrics_source: self.lyrics_source,
            added_at: self.added_at,
        }
    }
}
