//! # Download Manager
//!
//! Runs the per-item pipeline and composes its phases into one progress value:
//!
//! | phase | band | work |
//! |---|---|---|
//! | prepare | 0.00 - 0.10 | recreate `music/{id}/` |
//! | audio | 0.10 - 0.80 | resumable transfer of `audio.{format}`, lyrics race started alongside |
//! | cover | 0.80 - 0.90 | `cover.jpg` when the item has a cover URL |
//! | lyrics | 0.90 - 0.98 | await the race, write `lyrics.lrc` for the winner |
//! | commit | 1.00 | assemble the [`SongEntity`] |
//!
//! Any failure before commit deletes the item directory before the error is
//! returned. An aborted run fails with [`DownloadError::Transfer`] and rolls
//! back the same way. The catalog insert itself is left to the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::http::HttpClient;
use bridge_traits::storage::FileSystemAccess;
use core_async::task::JoinHandle;
use core_library::{LyricLine, SongEntity};
use core_metadata::{parse_lrc, LyricsQuery, LyricsRaceEngine, RaceOutcome};
use core_runtime::config::CoreConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::assets::{ItemLayout, StagedAssets, StagedLyrics};
use crate::error::{DownloadError, Result};
use crate::queue::QueueItem;
use crate::transfer::{ResumableTransfer, TransferControl};

pub const PREPARE_START: f64 = 0.0;
pub const PREPARE_END: f64 = 0.10;
pub const AUDIO_START: f64 = PREPARE_END;
pub const AUDIO_END: f64 = 0.80;
pub const COVER_START: f64 = AUDIO_END;
pub const COVER_END: f64 = 0.90;
pub const LYRICS_START: f64 = COVER_END;
pub const LYRICS_END: f64 = 0.98;
pub const COMMIT: f64 = 1.0;

pub const STAGE_PREPARING: &str = "Preparing";
pub const STAGE_AUDIO: &str = "Downloading audio";
pub const STAGE_COVER: &str = "Downloading cover";
pub const STAGE_LYRICS: &str = "Saving lyrics";
pub const STAGE_FINALIZING: &str = "Finalizing";

/// Composite progress callback: `(progress, stage_label)`.
pub type ProgressFn<'a> = dyn Fn(f64, &str) + Send + Sync + 'a;

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    /// Directory holding one sub-directory per item
    pub music_dir: PathBuf,
    pub enable_lyrics: bool,
    pub enable_cover_art: bool,
}

impl DownloadConfig {
    pub fn new(music_dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: music_dir.into(),
            enable_lyrics: true,
            enable_cover_art: true,
        }
    }

    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            music_dir: config.music_dir(),
            enable_lyrics: config.features.enable_lyrics,
            enable_cover_art: config.features.enable_cover_art,
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct DownloadManager {
    config: DownloadConfig,
    file_system: Arc<dyn FileSystemAccess>,
    transfer: ResumableTransfer,
    lyrics: Option<Arc<LyricsRaceEngine>>,
}

impl DownloadManager {
    pub fn new(
        config: DownloadConfig,
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            config,
            transfer: ResumableTransfer::new(http_client, Arc::clone(&file_system)),
            file_system,
            lyrics: None,
        }
    }

    /// Race lyrics providers during every run.
    pub fn with_lyrics(mut self, engine: Arc<LyricsRaceEngine>) -> Self {
        self.lyrics = Some(engine);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn layout(&self, item_id: &str) -> Result<ItemLayout> {
        ItemLayout::new(&self.config.music_dir, item_id)
    }

    /// Run the full pipeline for `item`.
    #[instrument(skip(self, item, control, on_progress), fields(item_id = %item.id))]
    pub async fn run(
        &self,
        item: &QueueItem,
        control: &TransferControl,
        on_progress: &ProgressFn<'_>,
    ) -> Result<SongEntity> {
        // Nothing on disk is touched for an id that cannot name a directory
        let layout = self.layout(&item.id)?;

        match self.run_phases(item, &layout, control, on_progress).await {
            Ok(entity) => Ok(entity),
            Err(e) => {
                if e.is_abort() {
                    info!("Run aborted, rolling back");
                } else {
                    error!(error = %e, "Run failed, rolling back");
                }
                self.rollback(&item.id).await;
                Err(e)
            }
        }
    }

    /// Delete the item directory. A missing directory is fine; other failures
    /// are logged only.
    pub async fn rollback(&self, item_id: &str) {
        let Ok(layout) = self.layout(item_id) else {
            return;
        };
        if let Err(e) = self.file_system.delete_dir_all(&layout.dir).await {
            warn!(item_id, error = %e, "Rollback could not delete item directory");
        }
    }

    async fn run_phases(
        &self,
        item: &QueueItem,
        layout: &ItemLayout,
        control: &TransferControl,
        on_progress: &ProgressFn<'_>,
    ) -> Result<SongEntity> {
        // Prepare
        on_progress(PREPARE_START, STAGE_PREPARING);
        self.file_system
            .delete_dir_all(&layout.dir)
            .await
            .map_err(|e| fs_error(&layout.dir, e))?;
        self.file_system
            .create_dir_all(&layout.dir)
            .await
            .map_err(|e| fs_error(&layout.dir, e))?;
        on_progress(PREPARE_END, STAGE_PREPARING);

        // Audio, with the lyrics race running alongside
        let mut assets = StagedAssets::resolve(item)?;
        let race = self.start_race(item);

        let audio_path = layout.audio_path(&assets.audio_format);
        on_progress(AUDIO_START, STAGE_AUDIO);
        let bytes = self
            .transfer
            .run(
                &assets.audio_url,
                &audio_path,
                control,
                &mut band(on_progress, AUDIO_START, AUDIO_END, STAGE_AUDIO),
            )
            .await?;
        info!(bytes, format = %assets.audio_format, "Audio downloaded");

        // Cover
        let mut cover_path = None;
        if let Some(url) = assets.cover_url.as_deref().filter(|_| self.config.enable_cover_art) {
            on_progress(COVER_START, STAGE_COVER);
            let path = layout.cover_path();
            self.transfer
                .run(
                    url,
                    &path,
                    control,
                    &mut band(on_progress, COVER_START, COVER_END, STAGE_COVER),
                )
                .await?;
            cover_path = Some(path);
        } else {
            debug!("No cover to download");
        }
        on_progress(COVER_END, STAGE_LYRICS);

        // Lyrics
        let mut lyrics: Vec<LyricLine> = Vec::new();
        if let Some(race) = race {
            let outcome = core_async::select! {
                _ = control.aborted() => return Err(DownloadError::aborted()),
                outcome = await_race(race) => outcome,
            };

            if let Some(best) = outcome.into_best() {
                let candidate = best.candidate;
                self.file_system
                    .write_file(&layout.lyrics_path(), candidate.text.clone().into())
                    .await
                    .map_err(|e| fs_error(&layout.lyrics_path(), e))?;
                lyrics = parse_lrc(&candidate.text);
                info!(
                    source = %candidate.source,
                    synced = candidate.is_synced,
                    score = best.match_score,
                    lines = lyrics.len(),
                    "Lyrics saved"
                );
                assets.lyrics = Some(StagedLyrics {
                    text: candidate.text,
                    source: candidate.source.as_str().to_string(),
                    is_synced: candidate.is_synced,
                });
            } else {
                info!("No lyrics found");
            }
        }
        on_progress(LYRICS_END, STAGE_LYRICS);

        // Commit
        let entity = SongEntity {
            id: item.id.clone(),
            title: item.song.title.clone(),
            artist: item.song.artist.clone(),
            album: item.song.album.clone(),
            duration_secs: item.song.duration_secs,
            audio_path,
            audio_format: assets.audio_format,
            cover_path,
            lyrics,
            lyrics_source: assets.lyrics.map(|l| l.source),
            added_at: chrono::Utc::now().timestamp(),
        };
        on_progress(COMMIT, STAGE_FINALIZING);

        Ok(entity)
    }

    fn start_race(&self, item: &QueueItem) -> Option<AbortOnDrop<RaceOutcome>> {
        if !self.config.enable_lyrics {
            return None;
        }
        let engine = Arc::clone(self.lyrics.as_ref()?);

        let mut query = LyricsQuery::new(&item.song.title, &item.song.artist);
        query.album = item.song.album.clone();
        query.duration_secs = item.song.duration_secs;

        let item_id = item.id.clone();
        Some(AbortOnDrop(core_async::spawn(async move {
            engine.race_for(&item_id, &query).await
        })))
    }
}

async fn await_race(mut race: AbortOnDrop<RaceOutcome>) -> RaceOutcome {
    match (&mut race.0).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Lyrics race task ended without a result");
            RaceOutcome::default()
        }
    }
}

/// Map raw `[0, 1]` progress into `[start, end]`.
fn band<'a>(
    on_progress: &'a ProgressFn<'a>,
    start: f64,
    end: f64,
    stage: &'a str,
) -> impl FnMut(f64) + Send + 'a {
    let weight = end - start;
    move |raw| on_progress(start + raw.clamp(0.0, 1.0) * weight, stage)
}

fn fs_error(path: &std::path::Path, e: bridge_traits::BridgeError) -> DownloadError {
    DownloadError::Filesystem(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_bands_are_contiguous() {
        assert_eq!(PREPARE_END, AUDIO_START);
        assert_eq!(AUDIO_END, COVER_START);
        assert_eq!(COVER_END, LYRICS_START);
        assert!(LYRICS_END < COMMIT);
    }

    #[test]
    fn test_band_maps_raw_progress() {
        let seen = Mutex::new(Vec::new());
        let record = |p: f64, stage: &str| seen.lock().unwrap().push((p, stage.to_string()));

        let mut audio = band(&record, AUDIO_START, AUDIO_END, STAGE_AUDIO);
        audio(0.0);
        audio(0.5);
        audio(2.0);
        drop(audio);

        let seen = seen.into_inner().unwrap();
        assert!((seen[0].0 - 0.10).abs() < 1e-9);
        assert!((seen[1].0 - 0.45).abs() < 1e-9);
        assert!((seen[2].0 - 0.80).abs() < 1e-9);
        assert_eq!(seen[1].1, STAGE_AUDIO);
    }
}
