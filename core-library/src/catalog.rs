//! Catalog boundary and its SQLite implementation.
//!
//! The queue orchestrator commits finished downloads through [`Catalog`].
//! Both operations are idempotent: committing the same entity twice leaves a
//! single song row, and re-placing a song keeps a single collection entry.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{LibraryError, Result};
use crate::models::{CollectionEntry, LyricRow, SongEntity, SongRow};

/// Destination for committed downloads.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert or replace a song together with its lyric lines.
    async fn add_entity(&self, entity: &SongEntity) -> Result<()>;

    /// Place a song inside a collection.
    ///
    /// With `sort_order = None` the song is appended after the current last
    /// entry; an existing entry keeps its position.
    async fn place_in_collection(
        &self,
        collection_id: &str,
        entity_id: &str,
        sort_order: Option<i64>,
    ) -> Result<()>;
}

/// SQLite-backed [`Catalog`].
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load a committed song with its lyrics in line order.
    pub async fn find_song(&self, id: &str) -> Result<Option<SongEntity>> {
        let row: Option<SongRow> = sqlx::query_as(
            r#"
            SELECT id, title, artist, album, duration_secs, audio_path, audio_format,
                   cover_path, lyrics_source, added_at
            FROM songs WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lyrics: Vec<LyricRow> = sqlx::query_as(
            "SELECT time_ms, text FROM song_lyrics WHERE song_id = ? ORDER BY line_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_entity(lyrics)))
    }

    /// Like [`find_song`](Self::find_song) but missing songs are an error.
    pub async fn get_song(&self, id: &str) -> Result<SongEntity> {
        self.find_song(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                kind: "song",
                id: id.to_string(),
            })
    }

    /// Entries of a collection ordered by position.
    pub async fn collection_entries(&self, collection_id: &str) -> Result<Vec<CollectionEntry>> {
        let entries = sqlx::query_as(
            r#"
            SELECT collection_id, song_id, sort_order, added_at
            FROM collection_entries
            WHERE collection_id = ?
            ORDER BY sort_order, added_at
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn count_songs(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    #[instrument(skip(self, entity), fields(song_id = %entity.id))]
    async fn add_entity(&self, entity: &SongEntity) -> Result<()> {
        entity.validate()?;

        let mut tx = self.pool.begin().await?;

        // Upsert instead of REPLACE so the cascading children are not dropped.
        sqlx::query(
            r#"
            INSERT INTO songs (
                id, title, artist, album, duration_secs, audio_path, audio_format,
                cover_path, lyrics_source, lyrics_synced, added_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration_secs = excluded.duration_secs,
                audio_path = excluded.audio_path,
                audio_format = excluded.audio_format,
                cover_path = excluded.cover_path,
                lyrics_source = excluded.lyrics_source,
                lyrics_synced = excluded.lyrics_synced
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.title)
        .bind(&entity.artist)
        .bind(&entity.album)
        .bind(entity.duration_secs.map(i64::from))
        .bind(entity.audio_path.to_string_lossy().into_owned())
        .bind(&entity.audio_format)
        .bind(
            entity
                .cover_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )
        .bind(&entity.lyrics_source)
        .bind(entity.has_synced_lyrics())
        .bind(entity.added_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM song_lyrics WHERE song_id = ?")
            .bind(&entity.id)
            .execute(&mut *tx)
            .await?;

        for (index, line) in entity.lyrics.iter().enumerate() {
            sqlx::query(
                "INSERT INTO song_lyrics (song_id, line_index, time_ms, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&entity.id)
            .bind(index as i64)
            .bind(line.time_ms.map(|t| t as i64))
            .bind(&line.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(lines = entity.lyrics.len(), "Song committed to catalog");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn place_in_collection(
        &self,
        collection_id: &str,
        entity_id: &str,
        sort_order: Option<i64>,
    ) -> Result<()> {
        if collection_id.trim().is_empty() {
            return Err(LibraryError::invalid("collection_id", "cannot be empty"));
        }

        let now = chrono::Utc::now().timestamp();

        match sort_order {
            Some(order) => {
                sqlx::query(
                    r#"
                    INSERT INTO collection_entries (collection_id, song_id, sort_order, added_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(collection_id, song_id) DO UPDATE SET sort_order = excluded.sort_order
                    "#,
                )
                .bind(collection_id)
                .bind(entity_id)
                .bind(order)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO collection_entries (collection_id, song_id, sort_order, added_at)
                    SELECT ?1, ?2, COALESCE(MAX(sort_order) + 1, 0), ?3
                    FROM collection_entries WHERE collection_id = ?1
                    ON CONFLICT(collection_id, song_id) DO NOTHING
                    "#,
                )
                .bind(collection_id)
                .bind(entity_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        debug!("Song placed in collection");
        Ok(())
    }
}
