// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, SyncError};
use crate::store::models::{Coordinate, NewPhoto, Photo, PhotoId, Pin, PinId};
use crate::store::observer::{Change, ChangeKind, ChangeObserver, ObserverRegistry, RecordFilter};
use crate::store::traits::LocalStore;

pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
    observers: ObserverRegistry,
    /// Held by every write from its first statement until its changes are
    /// published, so observers receive change sets in commit order.
    pub(crate) write_lock: AsyncMutex<()>,
}

impl SqliteStore {
    /// Open (or create) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::with_pool(pool).await?;
        info!(path = %db_path.display(), "Opened photo store");
        Ok(store)
    }

    /// Private in-memory database. The pool is pinned to a single
    /// connection that is never recycled, otherwise the data would vanish.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            observers: ObserverRegistry::new(),
            write_lock: AsyncMutex::new(()),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pin_id INTEGER NOT NULL REFERENCES pins(id) ON DELETE CASCADE,
                source_url TEXT NOT NULL,
                image_data BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_pin_id ON photos(pin_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Initialized SQLite photo store schema");
        Ok(())
    }

    fn pin_from_row(row: &SqliteRow) -> Result<Pin> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);

        Ok(Pin {
            id: PinId(row.try_get("id")?),
            coordinate: Coordinate {
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
            },
            created_at,
        })
    }

    fn photo_from_row(row: &SqliteRow) -> Result<Photo> {
        Ok(Photo {
            id: PhotoId(row.try_get("id")?),
            pin_id: PinId(row.try_get("pin_id")?),
            source_url: row.try_get("source_url")?,
            image_data: row.try_get("image_data")?,
        })
    }
}

fn validate_new_photo(index: usize, photo: &NewPhoto) -> Result<()> {
    if photo.source_url.trim().is_empty() {
        return Err(SyncError::Validation(format!(
            "photo #{} has an empty source url",
            index
        )));
    }

    let url = Url::parse(&photo.source_url).map_err(|e| {
        SyncError::Validation(format!(
            "photo #{} has an invalid source url '{}': {}",
            index, photo.source_url, e
        ))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(SyncError::Validation(format!(
            "photo #{} has unsupported url scheme '{}'",
            index, scheme
        ))),
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn insert_pin(&self, coordinate: Coordinate) -> Result<Pin> {
        coordinate.validate()?;
        let _write = self.write_lock.lock().await;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO pins (latitude, longitude, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let pin = Pin {
            id: PinId(result.last_insert_rowid()),
            coordinate,
            created_at,
        };

        self.observers.publish(&[Change::Pin {
            kind: ChangeKind::Insert,
            id: pin.id,
        }]);
        debug!(pin_id = %pin.id, "Inserted pin");
        Ok(pin)
    }

    async fn get_pin(&self, id: PinId) -> Result<Option<Pin>> {
        let row = sqlx::query("SELECT * FROM pins WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::pin_from_row).transpose()
    }

    async fn list_pins(&self) -> Result<Vec<Pin>> {
        let rows = sqlx::query("SELECT * FROM pins ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::pin_from_row).collect()
    }

    async fn delete_pin(&self, id: PinId) -> Result<bool> {
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM pins WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let photo_ids: Vec<i64> = sqlx::query("SELECT id FROM photos WHERE pin_id = ?1 ORDER BY id")
            .bind(id.0)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        sqlx::query("DELETE FROM photos WHERE pin_id = ?1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pins WHERE id = ?1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut changes: Vec<Change> = photo_ids
            .into_iter()
            .map(|photo_id| Change::Photo {
                kind: ChangeKind::Delete,
                id: PhotoId(photo_id),
                pin_id: id,
            })
            .collect();
        let photo_count = changes.len();
        changes.push(Change::Pin {
            kind: ChangeKind::Delete,
            id,
        });
        self.observers.publish(&changes);

        info!(pin_id = %id, photos = photo_count, "Deleted pin");
        Ok(true)
    }

    async fn photos_for_pin(&self, pin_id: PinId) -> Result<Vec<Photo>> {
        let rows = sqlx::query("SELECT * FROM photos WHERE pin_id = ?1 ORDER BY id")
            .bind(pin_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::photo_from_row).collect()
    }

    async fn count_photos(&self, pin_id: PinId) -> Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM photos WHERE pin_id = ?1")
            .bind(pin_id.0)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        Ok(count as usize)
    }

    async fn get_photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        let row = sqlx::query("SELECT * FROM photos WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::photo_from_row).transpose()
    }

    async fn insert_photos(&self, batch: Vec<NewPhoto>) -> Result<Vec<Photo>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        for (index, photo) in batch.iter().enumerate() {
            validate_new_photo(index, photo)?;
        }

        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut known_pins: Vec<PinId> = Vec::new();
        for photo in &batch {
            if known_pins.contains(&photo.pin_id) {
                continue;
            }
            let exists = sqlx::query("SELECT id FROM pins WHERE id = ?1")
                .bind(photo.pin_id.0)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            if !exists {
                warn!(pin_id = %photo.pin_id, "Rejecting photo batch for missing pin");
                return Err(SyncError::Validation(format!(
                    "pin {} does not exist",
                    photo.pin_id
                )));
            }
            known_pins.push(photo.pin_id);
        }

        let mut inserted = Vec::with_capacity(batch.len());
        for photo in batch {
            let result = sqlx::query("INSERT INTO photos (pin_id, source_url) VALUES (?1, ?2)")
                .bind(photo.pin_id.0)
                .bind(&photo.source_url)
                .execute(&mut *tx)
                .await?;

            inserted.push(Photo {
                id: PhotoId(result.last_insert_rowid()),
                pin_id: photo.pin_id,
                source_url: photo.source_url,
                image_data: None,
            });
        }

        tx.commit().await?;

        let changes: Vec<Change> = inserted
            .iter()
            .map(|photo| Change::Photo {
                kind: ChangeKind::Insert,
                id: photo.id,
                pin_id: photo.pin_id,
            })
            .collect();
        self.observers.publish(&changes);

        debug!(count = inserted.len(), "Inserted photo placeholders");
        Ok(inserted)
    }

    async fn set_image_data(&self, id: PhotoId, bytes: &[u8]) -> Result<bool> {
        if bytes.is_empty() {
            return Err(SyncError::Validation(format!(
                "refusing to store empty image data for photo {}",
                id
            )));
        }

        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT pin_id FROM photos WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(SyncError::PhotoNotFound(id))?;
        let pin_id = PinId(row.try_get("pin_id")?);

        // image_data only ever moves from NULL to a value
        let result = sqlx::query(
            "UPDATE photos SET image_data = ?2 WHERE id = ?1 AND image_data IS NULL",
        )
        .bind(id.0)
        .bind(bytes)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            debug!(photo_id = %id, "Photo already has image data");
            return Ok(false);
        }

        tx.commit().await?;

        self.observers.publish(&[Change::Photo {
            kind: ChangeKind::Update,
            id,
            pin_id,
        }]);
        debug!(photo_id = %id, bytes = bytes.len(), "Stored image data");
        Ok(true)
    }

    async fn delete_photos(&self, ids: &[PhotoId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut changes = Vec::with_capacity(ids.len());

        for id in ids {
            let row = sqlx::query("SELECT pin_id FROM photos WHERE id = ?1")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(row) = row else {
                continue;
            };
            let pin_id = PinId(row.try_get("pin_id")?);

            sqlx::query("DELETE FROM photos WHERE id = ?1")
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
            changes.push(Change::Photo {
                kind: ChangeKind::Delete,
                id: *id,
                pin_id,
            });
        }

        tx.commit().await?;
        self.observers.publish(&changes);

        info!(requested = ids.len(), deleted = changes.len(), "Deleted photos");
        Ok(changes.len())
    }

    fn observe(&self, filter: RecordFilter) -> ChangeObserver {
        self.observers.subscribe(filter)
    }
}
