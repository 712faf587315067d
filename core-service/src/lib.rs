//! Core service façade and bootstrap.
//!
//! [`DownloadService`] wires a [`CoreConfig`] into a running download core:
//! the SQLite catalog, the lyrics race engine, the per-item pipeline, the
//! queue store and the orchestrator that drives it. Hosts enqueue songs and
//! observe progress through the store snapshot or the event bus.
//!
//! Desktop builds enable `desktop-shims`, which lets [`CoreConfig::builder`]
//! fall back to the reqwest and tokio bridges from `bridge-desktop`. The
//! `lyrics` feature compiles in the remote lyrics providers; without it the
//! pipeline never races for lyrics.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::{DownloadService, SongSnapshot, AudioSource};
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder().library_root("/tmp/tunevault").build()?;
//! let service = DownloadService::start(config).await?;
//!
//! service.enqueue(
//!     vec![SongSnapshot::new("Blue", "Joni Mitchell")
//!         .audio(AudioSource::new("https://cdn.example/blue.mp3", "mp3"))],
//!     None,
//! );
//! # service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_download::{
    AudioSource, PlacementHint, QueueItem, QueueSnapshot, QueueStats, QueueStatus, QueueStore,
    SongSnapshot,
};

use std::sync::Arc;

use core_download::{
    DownloadConfig, DownloadManager, OrchestratorConfig, OrchestratorHandle, QueueOrchestrator,
};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::SqliteCatalog;
use core_metadata::LyricsRaceEngine;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver, DEFAULT_EVENT_BUFFER_SIZE};
use tracing::info;

/// Primary façade exposed to host applications.
pub struct DownloadService {
    config: CoreConfig,
    store: QueueStore,
    events: EventBus,
    catalog: Arc<SqliteCatalog>,
    orchestrator: OrchestratorHandle,
}

impl DownloadService {
    /// Open the catalog, build the pipeline and start the orchestrator.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, the library directories
    /// cannot be created or the catalog cannot be opened and migrated.
    pub async fn start(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        info!(
            library_root = %config.library_root.display(),
            max_concurrent = config.max_concurrent_downloads,
            lyrics = config.features.enable_lyrics,
            cover_art = config.features.enable_cover_art,
            "Starting download service"
        );

        config.file_system.create_dir_all(&config.music_dir()).await?;
        if let Some(parent) = config.database_path.parent() {
            config.file_system.create_dir_all(parent).await?;
        }

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let catalog = Arc::new(SqliteCatalog::new(pool));

        let events = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        let store = QueueStore::new().with_events(events.clone());

        let mut manager = DownloadManager::new(
            DownloadConfig::from_core_config(&config),
            Arc::clone(&config.http_client),
            Arc::clone(&config.file_system),
        );
        if let Some(engine) = build_race_engine(&config, &events) {
            manager = manager.with_lyrics(Arc::new(engine));
        }

        let orchestrator = QueueOrchestrator::new(
            store.clone(),
            Arc::new(manager),
            catalog.clone(),
            events.clone(),
            OrchestratorConfig::from_core_config(&config),
        )
        .start();

        Ok(Self {
            config,
            store,
            events,
            catalog,
            orchestrator,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn catalog(&self) -> Arc<SqliteCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.store.snapshot()
    }

    pub fn stats(&self) -> QueueStats {
        self.store.stats()
    }

    /// Queue songs under fresh ids. Returns the ids in order.
    pub fn enqueue(&self, songs: Vec<SongSnapshot>, placement: Option<PlacementHint>) -> Vec<String> {
        let items = songs.into_iter().map(QueueItem::from_song).collect();
        self.store.enqueue(items, placement)
    }

    /// Queue prepared items; ids already queued are skipped.
    pub fn enqueue_items(&self, items: Vec<QueueItem>, placement: Option<PlacementHint>) -> Vec<String> {
        self.store.enqueue(items, placement)
    }

    pub fn pause(&self, item_id: &str) -> bool {
        self.store.pause(item_id)
    }

    pub fn resume(&self, item_id: &str) -> bool {
        self.store.resume(item_id)
    }

    pub fn retry(&self, item_id: &str) -> bool {
        self.store.retry(item_id)
    }

    /// Drop an item; a running pipeline for it is aborted and rolled back.
    pub fn remove(&self, item_id: &str) -> bool {
        self.store.remove(item_id)
    }

    pub fn clear_completed(&self) -> usize {
        self.store.clear_completed()
    }

    pub fn active_downloads(&self) -> usize {
        self.orchestrator.active_count()
    }

    /// Stop dispatching and abort running pipelines.
    pub async fn shutdown(self) {
        self.orchestrator.shutdown().await;
        self.catalog.pool().close().await;
        info!("Download service stopped");
    }
}

#[cfg(feature = "lyrics")]
fn build_race_engine(config: &CoreConfig, events: &EventBus) -> Option<LyricsRaceEngine> {
    if !config.features.enable_lyrics {
        return None;
    }
    let providers = core_metadata::default_providers(
        Arc::clone(&config.http_client),
        config.musixmatch_api_key.clone(),
    );
    Some(
        LyricsRaceEngine::new(providers, core_metadata::RaceConfig::from_core_config(config))
            .with_events(events.clone()),
    )
}

#[cfg(not(feature = "lyrics"))]
fn build_race_engine(config: &CoreConfig, _events: &EventBus) -> Option<LyricsRaceEngine> {
    if config.features.enable_lyrics {
        tracing::warn!("Lyrics enabled but no providers compiled in");
    }
    None
}
