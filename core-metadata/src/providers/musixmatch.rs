use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use serde::Deserialize;
use tracing::debug;

use super::{get_json, non_empty};
use crate::error::Result;
use crate::lyrics::{CandidateMetadata, LyricsCandidate, LyricsProvider, LyricsQuery, LyricsSource};

pub const MUSIXMATCH_BASE_URL: &str = "https://api.musixmatch.com/ws/1.1";

/// Musixmatch provider - Commercial lyrics (requires API key)
///
/// Two calls: `track.search` to resolve a track id, then `track.lyrics.get`.
/// The free tier returns plain, truncated lyrics with a disclaimer footer,
/// which is stripped.
pub struct MusixmatchProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
}

impl MusixmatchProvider {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: String) -> Self {
        Self::with_base_url(http_client, api_key, MUSIXMATCH_BASE_URL)
    }

    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        api_key: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_key,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: Message<T>,
}

#[derive(Debug, Deserialize)]
struct Message<T> {
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TrackList {
    #[serde(default)]
    track_list: Vec<TrackWrapper>,
}

#[derive(Debug, Deserialize)]
struct TrackWrapper {
    track: Track,
}

#[derive(Debug, Deserialize)]
struct Track {
    track_id: u64,
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    album_name: Option<String>,
    #[serde(default)]
    track_length: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LyricsBody {
    lyrics: Option<Lyrics>,
}

#[derive(Debug, Deserialize)]
struct Lyrics {
    #[serde(default)]
    lyrics_body: Option<String>,
}

/// Drop the "******* This Lyrics is NOT for Commercial use *******" footer.
fn strip_disclaimer(body: &str) -> String {
    let cut = body.find("*******").unwrap_or(body.len());
    body[..cut].trim().to_string()
}

#[async_trait]
impl LyricsProvider for MusixmatchProvider {
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsCandidate>> {
        let search_url = format!(
            "{}/track.search?q_artist={}&q_track={}&f_has_lyrics=1&page_size=1&apikey={}",
            self.base_url,
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title),
            urlencoding::encode(&self.api_key)
        );

        let search: Option<Envelope<TrackList>> =
            get_json(self.http_client.as_ref(), self.source(), &search_url).await?;

        let Some(track) = search
            .and_then(|e| e.message.body)
            .and_then(|body| body.track_list.into_iter().next())
            .map(|w| w.track)
        else {
            debug!("Musixmatch search returned no tracks");
            return Ok(None);
        };

        let lyrics_url = format!(
            "{}/track.lyrics.get?track_id={}&apikey={}",
            self.base_url,
            track.track_id,
            urlencoding::encode(&self.api_key)
        );

        let lyrics: Option<Envelope<LyricsBody>> =
            get_json(self.http_client.as_ref(), self.source(), &lyrics_url).await?;

        let text = lyrics
            .and_then(|e| e.message.body)
            .and_then(|body| body.lyrics)
            .and_then(|l| non_empty(l.lyrics_body))
            .map(|body| strip_disclaimer(&body))
            .filter(|text| !text.is_empty());

        let Some(text) = text else {
            return Ok(None);
        };

        let metadata = CandidateMetadata {
            title: track.track_name,
            artist: track.artist_name,
            album: track.album_name,
            duration_secs: track.track_length.filter(|len| *len > 0),
        };

        Ok(Some(
            LyricsCandidate::new(text, false, self.source()).with_metadata(metadata),
        ))
    }

    fn source(&self) -> LyricsSource {
        LyricsSource::Musixmatch
    }
}
