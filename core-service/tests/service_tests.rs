use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{ByteRange, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::BridgeError;
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, EventStream};
use core_service::{AudioSource, DownloadService, PlacementHint, QueueStatus, SongSnapshot};
use futures_util::StreamExt;

const AUDIO_URL: &str = "https://cdn.test/track.mp3";

/// Serves one audio asset; every API call gets a 404.
struct OneTrackHttp {
    audio: Bytes,
}

#[async_trait]
impl HttpClient for OneTrackHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 404,
            headers: HashMap::new(),
            body: Bytes::new(),
        })
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> BridgeResult<ByteRange> {
        if url != AUDIO_URL {
            return Err(BridgeError::Status {
                status: 404,
                url: url.to_string(),
            });
        }
        let start = offset.min(self.audio.len() as u64);
        let body = self.audio.slice(start as usize..);
        Ok(ByteRange {
            status: if start > 0 { 206 } else { 200 },
            start,
            total_len: Some(self.audio.len() as u64),
            body: futures_util::stream::iter(vec![Ok(body)]).boxed(),
        })
    }
}

fn config(root: &std::path::Path) -> CoreConfig {
    CoreConfig::builder()
        .library_root(root)
        .http_client(Arc::new(OneTrackHttp {
            audio: Bytes::from_static(b"ID3 not really an mp3"),
        }))
        .file_system(Arc::new(TokioFileSystem::new()))
        .lyrics_deadline(Duration::from_millis(200))
        .build()
        .unwrap()
}

async fn next_terminal(stream: &mut EventStream) -> DownloadEvent {
    let event = tokio::time::timeout(Duration::from_secs(10), stream.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        CoreEvent::Download(event) => event,
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_enqueued_song_reaches_catalog() {
    let root = tempfile::tempdir().unwrap();
    let service = DownloadService::start(config(root.path())).await.unwrap();
    let mut rx = EventStream::new(service.subscribe()).terminal_only();

    let ids = service.enqueue(
        vec![SongSnapshot::new("Track", "Artist").audio(AudioSource::new(AUDIO_URL, "mp3"))],
        Some(PlacementHint::append_to("inbox")),
    );
    assert_eq!(ids.len(), 1);

    let event = next_terminal(&mut rx).await;
    assert_eq!(event, DownloadEvent::Completed { item_id: ids[0].clone() });

    let song = service.catalog().get_song(&ids[0]).await.unwrap();
    assert_eq!(song.title, "Track");
    assert!(song.audio_path.starts_with(root.path().join("music")));
    assert!(song.audio_path.is_file());
    assert!(song.lyrics.is_empty());

    let entries = service.catalog().collection_entries("inbox").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(service.stats().completed, 1);
    assert_eq!(service.clear_completed(), 1);

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_item_can_be_retried() {
    let root = tempfile::tempdir().unwrap();
    let service = DownloadService::start(config(root.path())).await.unwrap();
    let mut rx = EventStream::new(service.subscribe()).terminal_only();

    let ids = service.enqueue(
        vec![SongSnapshot::new("Missing", "Artist")
            .audio(AudioSource::new("https://cdn.test/nowhere.mp3", "mp3"))],
        None,
    );

    assert!(matches!(next_terminal(&mut rx).await, DownloadEvent::Failed { .. }));
    assert_eq!(service.snapshot()[0].status, QueueStatus::Failed);
    assert!(!root.path().join("music").join(&ids[0]).exists());

    assert!(service.retry(&ids[0]));
    assert!(matches!(next_terminal(&mut rx).await, DownloadEvent::Failed { .. }));
    assert_eq!(service.active_downloads(), 0);

    service.shutdown().await;
}
