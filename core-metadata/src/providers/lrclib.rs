use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use serde::Deserialize;

use super::{get_json, non_empty};
use crate::error::Result;
use crate::lyrics::{CandidateMetadata, LyricsCandidate, LyricsProvider, LyricsQuery, LyricsSource};

pub const LRCLIB_BASE_URL: &str = "https://lrclib.net/api";

/// Record shape shared by `/api/get` and `/api/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LrcLibRecord {
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    album_name: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    instrumental: bool,
    #[serde(default)]
    plain_lyrics: Option<String>,
    #[serde(default)]
    synced_lyrics: Option<String>,
}

impl LrcLibRecord {
    fn has_synced(&self) -> bool {
        self.synced_lyrics
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    fn duration_secs(&self) -> Option<u32> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32)
    }

    /// Prefer synced lyrics, fall back to plain. Instrumentals have neither.
    fn into_candidate(self, source: LyricsSource) -> Option<LyricsCandidate> {
        if self.instrumental {
            return None;
        }

        let metadata = CandidateMetadata {
            title: self.track_name.clone(),
            artist: self.artist_name.clone(),
            album: self.album_name.clone(),
            duration_secs: self.duration_secs(),
        };

        let (text, is_synced) = match non_empty(self.synced_lyrics) {
            Some(synced) => (synced, true),
            None => (non_empty(self.plain_lyrics)?, false),
        };

        Some(LyricsCandidate::new(text, is_synced, source).with_metadata(metadata))
    }
}

/// LRCLib exact lookup (`/api/get`).
pub struct LrcLibGetProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl LrcLibGetProvider {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_base_url(http_client, LRCLIB_BASE_URL)
    }

    pub fn with_base_url(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, query: &LyricsQuery) -> String {
        let mut url = format!(
            "{}/get?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title)
        );

        if let Some(album) = &query.album {
            url.push_str(&format!("&album_name={}", urlencoding::encode(album)));
        }

        if let Some(duration) = query.duration_secs {
            url.push_str(&format!("&duration={}", duration));
        }

        url
    }
}

#[async_trait]
impl LyricsProvider for LrcLibGetProvider {
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsCandidate>> {
        let record: Option<LrcLibRecord> =
            get_json(self.http_client.as_ref(), self.source(), &self.url(query)).await?;

        Ok(record.and_then(|r| r.into_candidate(self.source())))
    }

    fn source(&self) -> LyricsSource {
        LyricsSource::LrcLib
    }
}

/// LRCLib fuzzy search (`/api/search`). Picks the best of the returned
/// records: synced first, then closest duration.
pub struct LrcLibSearchProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl LrcLibSearchProvider {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_base_url(http_client, LRCLIB_BASE_URL)
    }

    pub fn with_base_url(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, query: &LyricsQuery) -> String {
        format!(
            "{}/search?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(&query.title),
            urlencoding::encode(&query.artist)
        )
    }
}

pub(crate) fn pick_best_record(
    records: Vec<LrcLibRecord>,
    duration_secs: Option<u32>,
) -> Option<LrcLibRecord> {
    let distance = |record: &LrcLibRecord| match (duration_secs, record.duration_secs()) {
        (Some(want), Some(have)) => want.abs_diff(have),
        _ => u32::MAX,
    };

    records
        .into_iter()
        .filter(|r| !r.instrumental)
        .filter(|r| r.has_synced() || non_empty(r.plain_lyrics.clone()).is_some())
        .min_by_key(|r| (!r.has_synced(), distance(r)))
}

#[async_trait]
impl LyricsProvider for LrcLibSearchProvider {
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsCandidate>> {
        let records: Option<Vec<LrcLibRecord>> =
            get_json(self.http_client.as_ref(), self.source(), &self.url(query)).await?;

        Ok(records
            .and_then(|records| pick_best_record(records, query.duration_secs))
            .and_then(|r| r.into_candidate(self.source())))
    }

    fn source(&self) -> LyricsSource {
        LyricsSource::LrcLibSearch
    }
}
