//! Query and candidate types shared by every lyrics provider, plus the
//! [`LyricsProvider`] trait the race engine fans out to.
//!
//! A provider translates `(title, artist, duration)` into a synced or plain
//! lyrics payload. "Not found" is `Ok(None)`; only transport failures and
//! unexpected HTTP statuses are errors, and the race engine swallows those.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};

/// What the race asks every provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsQuery {
    pub title: String,
    pub artist: String,
    /// Narrows LRCLib's exact lookup to one release
    pub album: Option<String>,
    /// Reference duration for the duration score
    pub duration_secs: Option<u32>,
    /// Known lyrics text to compare candidates against
    pub reference_lyrics: Option<String>,
}

impl LyricsQuery {
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

    pub fn reference_lyrics(mut self, text: impl Into<String>) -> Self {
        self.reference_lyrics = Some(text.into());
        self
    }

    /// Reject queries no provider can answer.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(MetadataError::InvalidQuery("title is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsSource {
    /// `/api/get`, exact title/artist/duration
    LrcLib,
    /// `/api/search`, best fuzzy hit
    LrcLibSearch,
    /// Only registered when an API key is configured
    Musixmatch,
    /// Plain text only
    LyricsOvh,
}

impl LyricsSource {
    /// Stored in the catalog's `lyrics_source` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LrcLib => "lrclib",
            Self::LrcLibSearch => "lrclib-search",
            Self::Musixmatch => "musixmatch",
            Self::LyricsOvh => "lyrics.ovh",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LrcLib => "LRCLib",
            Self::LrcLibSearch => "LRCLib Search",
            Self::Musixmatch => "Musixmatch",
            Self::LyricsOvh => "lyrics.ovh",
        }
    }

    /// Whether the source ever returns timestamped LRC
    pub fn supports_synced(&self) -> bool {
        matches!(self, Self::LrcLib | Self::LrcLibSearch)
    }
}

impl std::fmt::Display for LyricsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the provider says it matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
}

/// One provider's answer, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsCandidate {
    /// Raw LRC (when synced) or plain text
    pub text: String,
    pub is_synced: bool,
    pub source: LyricsSource,
    pub metadata: CandidateMetadata,
}

impl LyricsCandidate {
    pub fn new(text: impl Into<String>, is_synced: bool, source: LyricsSource) -> Self {
        Self {
            text: text.into(),
            is_synced,
            source,
            metadata: CandidateMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One remote lyrics source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// `Ok(None)` when the source has nothing for the query. Errors are
    /// logged by the race and count as no answer.
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsCandidate>>;

    fn source(&self) -> LyricsSource;
}
