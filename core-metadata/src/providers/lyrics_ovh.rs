use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use serde::Deserialize;

use super::{get_json, non_empty};
use crate::error::Result;
use crate::lyrics::{CandidateMetadata, LyricsCandidate, LyricsProvider, LyricsQuery, LyricsSource};

pub const LYRICS_OVH_BASE_URL: &str = "https://api.lyrics.ovh/v1";

/// lyrics.ovh: plain lyrics keyed by `artist/title`, no metadata beyond
/// what was asked.
pub struct LyricsOvhProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl LyricsOvhProvider {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_base_url(http_client, LYRICS_OVH_BASE_URL)
    }

    pub fn with_base_url(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LyricsOvhResponse {
    #[serde(default)]
    lyrics: Option<String>,
}

#[async_trait]
impl LyricsProvider for LyricsOvhProvider {
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsCandidate>> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title)
        );

        let response: Option<LyricsOvhResponse> =
            get_json(self.http_client.as_ref(), self.source(), &url).await?;

        let Some(text) = response.and_then(|r| non_empty(r.lyrics)) else {
            return Ok(None);
        };

        // The API echoes the request, so the title is only what we asked for.
        let metadata = CandidateMetadata {
            title: Some(query.title.clone()),
            artist: Some(query.artist.clone()),
            ..CandidateMetadata::default()
        };

        Ok(Some(
            LyricsCandidate::new(text.replace("\r\n", "\n"), false, self.source())
                .with_metadata(metadata),
        ))
    }

    fn source(&self) -> LyricsSource {
        LyricsSource::LyricsOvh
    }
}
