//! HTTP lyrics providers.
//!
//! Every provider goes through [`get_json`], which retries transient failures,
//! maps 404 to "no result" and any other non-2xx status to
//! [`MetadataError::Provider`].

mod lrclib;
mod lyrics_ovh;
mod musixmatch;

pub use lrclib::{LrcLibGetProvider, LrcLibSearchProvider, LRCLIB_BASE_URL};
pub use lyrics_ovh::{LyricsOvhProvider, LYRICS_OVH_BASE_URL};
pub use musixmatch::{MusixmatchProvider, MUSIXMATCH_BASE_URL};

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use serde::de::DeserializeOwned;
use core_runtime::logging::redact_url_secrets;
use tracing::{debug, trace};

use crate::error::{MetadataError, Result};
use crate::lyrics::{LyricsProvider, LyricsSource};

/// Per-request timeout for provider calls. The race deadline bounds the
/// overall wait; this only keeps hung connections from piling up.
pub const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The default provider set: both LRCLib lookups and lyrics.ovh, plus
/// Musixmatch when an API key is configured.
pub fn default_providers(
    http_client: Arc<dyn HttpClient>,
    musixmatch_api_key: Option<String>,
) -> Vec<Arc<dyn LyricsProvider>> {
    let mut providers: Vec<Arc<dyn LyricsProvider>> = vec![
        Arc::new(LrcLibGetProvider::new(http_client.clone())),
        Arc::new(LrcLibSearchProvider::new(http_client.clone())),
        Arc::new(LyricsOvhProvider::new(http_client.clone())),
    ];

    match musixmatch_api_key.filter(|key| !key.trim().is_empty()) {
        Some(key) => providers.push(Arc::new(MusixmatchProvider::new(http_client, key))),
        None => debug!("Musixmatch API key not configured, provider disabled"),
    }

    providers
}

/// GET `url` and decode the JSON body. `Ok(None)` on 404.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http_client: &dyn HttpClient,
    source: LyricsSource,
    url: &str,
) -> Result<Option<T>> {
    trace!(provider = source.display_name(), url = %redact_url_secrets(url), "Provider request");
    let request = HttpRequest::get(url).timeout(PROVIDER_REQUEST_TIMEOUT);
    let response = http_client
        .execute_with_retry(request, RetryPolicy::default())
        .await?;

    if response.status == 404 {
        return Ok(None);
    }

    if !response.is_success() {
        return Err(MetadataError::Provider {
            provider: source.display_name().to_string(),
            status: response.status,
        });
    }

    response.json().map(Some).map_err(|e| MetadataError::Parse {
        provider: source.display_name().to_string(),
        message: e.to_string(),
    })
}

/// Trimmed text, `None` when blank.
pub(crate) fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
