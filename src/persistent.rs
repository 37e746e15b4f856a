//!
//! src/persistent.rs
//!
//! Catalog store. The `CatalogStore` trait is what the resolver and the
//! catalog operations consume; `SqliteCatalog` backs it with an sqlite
//! database that also holds the user accounts.
//!
//! `SqliteCatalog::init` must run before use (it creates the schema) and
//! `close` should run on shutdown so pending writes are flushed.
//!

use std::{path::{Path, PathBuf}, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow}, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::types::{Track, TrackMetadata, TrackPatch, User};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Track>, StoreError>;

    /// Oldest track with this exact (name, artist) pair
    async fn get_by_key(&self, name: &str, artist_name: &str) ->
        Result<Option<Track>, StoreError>;

    async fn get_by_isrc(&self, isrc: &str) -> Result<Option<Track>, StoreError>;

    async fn list(&self) -> Result<Vec<Track>, StoreError>;

    /// Fails with `StoreError::Conflict` when the ISRC is already taken
    async fn create(&self, track: &TrackMetadata) -> Result<Track, StoreError>;

    /// `None` when no track has this id
    async fn update(&self, id: &str, patch: &TrackPatch) -> Result<Option<Track>, StoreError>;

    /// Returns the deleted record, `None` when no track has this id
    async fn delete(&self, id: &str) -> Result<Option<Track>, StoreError>;
}

const TRACK_COLUMNS: &str =
    "id, name, artist_name, duration, isrc, release_date, created_at, updated_at";

pub struct SqliteCatalog {
    pool: Pool<Sqlite>
}

impl SqliteCatalog {

    async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tracks (
              id            TEXT PRIMARY KEY,
              name          TEXT NOT NULL,
              artist_name   TEXT NOT NULL,
              duration      INTEGER NOT NULL CHECK (duration >= 1),
              isrc          TEXT NOT NULL UNIQUE,
              release_date  TEXT NOT NULL,
              created_at    INTEGER NOT NULL,
              updated_at    INTEGER NOT NULL
            );
            "
        ).execute(pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tracks_name_artist ON tracks(name, artist_name);"
        ).execute(pool).await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
              id             INTEGER PRIMARY KEY AUTOINCREMENT,
              email          TEXT NOT NULL UNIQUE,
              password_hash  TEXT NOT NULL,
              created_at     INTEGER NOT NULL
            );
            "
        ).execute(pool).await?;

        Ok(())
    }

    /// Directory holding the database file, so it can be created up front
    fn parent_dir(database_url: &str) -> Option<PathBuf> {
        let path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        let path = path.split('?').next().unwrap_or(path);
        Path::new(path).parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    pub async fn init(database_url: &str) -> Result<Self, StoreError> {
        let is_memory = database_url == "sqlite::memory:";

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only
        if !is_memory {
            if let Some(dir) = Self::parent_dir(database_url) {
                std::fs::create_dir_all(&dir)
                    .map_err(|e| StoreError::Db(format!("create {}: {e}", dir.display())))?;
            }
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        // every in-memory connection is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {8})
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts)
            .await?;

        Self::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn timestamp(ms: i64) -> Result<DateTime<Utc>, StoreError> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| StoreError::Db(format!("bad timestamp {ms}")))
    }

    fn track_from_row(r: &SqliteRow) -> Result<Track, StoreError> {
        Ok(Track {
            id: r.try_get("id")?,
            name: r.try_get("name")?,
            artist_name: r.try_get("artist_name")?,
            duration: r.try_get("duration")?,
            isrc: r.try_get("isrc")?,
            release_date: r.try_get("release_date")?,
            created_at: Self::timestamp(r.try_get("created_at")?)?,
            updated_at: Self::timestamp(r.try_get("updated_at")?)?,
        })
    }

    fn user_from_row(r: &SqliteRow) -> Result<User, StoreError> {
        Ok(User {
            id: r.try_get("id")?,
            email: r.try_get("email")?,
            password_hash: r.try_get("password_hash")?,
        })
    }

    pub async fn insert_user(&self, email: &str, password_hash: &str) ->
        Result<User, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO users (email, password_hash, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id;
            "
        )
        .bind(email)
        .bind(password_hash)
        .bind(Self::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(User { id, email: email.to_string(), password_hash: password_hash.to_string() })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash FROM users WHERE email = ?1;"
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash FROM users WHERE id = ?1;"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    pub async fn count_tracks(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM tracks;")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn get_by_id(&self, id: &str) -> Result<Option<Track>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1;"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::track_from_row).transpose()
    }

    async fn get_by_key(&self, name: &str, artist_name: &str) ->
        Result<Option<Track>, StoreError> {
        let row = sqlx::query(&format!(
            r"
            SELECT {TRACK_COLUMNS} FROM tracks
             WHERE name = ?1 AND artist_name = ?2
             ORDER BY created_at ASC, id ASC
             LIMIT 1;
            "
        ))
        .bind(name)
        .bind(artist_name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::track_from_row).transpose()
    }

    async fn get_by_isrc(&self, isrc: &str) -> Result<Option<Track>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE isrc = ?1;"))
            .bind(isrc)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::track_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Track>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks ORDER BY created_at ASC, id ASC;"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::track_from_row).collect()
    }

    async fn create(&self, track: &TrackMetadata) -> Result<Track, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Self::now();
        sqlx::query(
            r"
            INSERT INTO tracks (
                id, name, artist_name, duration, isrc, release_date,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);
            "
        )
        .bind(&id)
        .bind(&track.name)
        .bind(&track.artist_name)
        .bind(track.duration)
        .bind(&track.isrc)
        .bind(&track.release_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let stamp = Self::timestamp(now)?;
        Ok(Track {
            id,
            name: track.name.clone(),
            artist_name: track.artist_name.clone(),
            duration: track.duration,
            isrc: track.isrc.clone(),
            release_date: track.release_date.clone(),
            created_at: stamp,
            updated_at: stamp,
        })
    }

    async fn update(&self, id: &str, patch: &TrackPatch) -> Result<Option<Track>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE tracks
               SET name = COALESCE(?1, name),
                   artist_name = COALESCE(?2, artist_name),
                   duration = COALESCE(?3, duration),
                   isrc = COALESCE(?4, isrc),
                   release_date = COALESCE(?5, release_date),
                   updated_at = ?6
             WHERE id = ?7;
            "
        )
        .bind(patch.name.as_ref())
        .bind(patch.artist_name.as_ref())
        .bind(patch.duration)
        .bind(patch.isrc.as_ref())
        .bind(patch.release_date.as_ref())
        .bind(Self::now())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1;"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let track = Self::track_from_row(&row)?;
        tx.commit().await?;

        Ok(Some(track))
    }

    async fn delete(&self, id: &str) -> Result<Option<Track>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1;"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let track = Self::track_from_row(&row)?;

        sqlx::query("DELETE FROM tracks WHERE id = ?1;")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(track))
    }
}
