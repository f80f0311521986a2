// SPDX-License-Identifier: GPL-3.0-only
use sqlx::Row;
use tracing::debug;

use crate::error::Result;
use crate::store::models::MapRegion;
use crate::store::sqlite::SqliteStore;

const CENTER_LATITUDE: &str = "map.center_latitude";
const CENTER_LONGITUDE: &str = "map.center_longitude";
const SPAN_LATITUDE: &str = "map.span_latitude";
const SPAN_LONGITUDE: &str = "map.span_longitude";

impl SqliteStore {
    /// Last saved map region, or None until all four values have been written
    pub async fn load_region(&self) -> Result<Option<MapRegion>> {
        let rows = sqlx::query("SELECT key, value FROM settings WHERE key LIKE 'map.%'")
            .fetch_all(&self.pool)
            .await?;

        let mut center_latitude = None;
        let mut center_longitude = None;
        let mut span_latitude = None;
        let mut span_longitude = None;

        for row in rows {
            let key: String = row.try_get("key")?;
            let value: f64 = row.try_get("value")?;
            match key.as_str() {
                CENTER_LATITUDE => center_latitude = Some(value),
                CENTER_LONGITUDE => center_longitude = Some(value),
                SPAN_LATITUDE => span_latitude = Some(value),
                SPAN_LONGITUDE => span_longitude = Some(value),
                _ => {}
            }
        }

        match (center_latitude, center_longitude, span_latitude, span_longitude) {
            (
                Some(center_latitude),
                Some(center_longitude),
                Some(span_latitude),
                Some(span_longitude),
            ) => Ok(Some(MapRegion {
                center_latitude,
                center_longitude,
                span_latitude,
                span_longitude,
            })),
            _ => Ok(None),
        }
    }

    /// Persist the visible map region; called on every region change
    pub async fn save_region(&self, region: &MapRegion) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for (key, value) in [
            (CENTER_LATITUDE, region.center_latitude),
            (CENTER_LONGITUDE, region.center_longitude),
            (SPAN_LATITUDE, region.span_latitude),
            (SPAN_LONGITUDE, region.span_longitude),
        ] {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(?region, "Saved map region");
        Ok(())
    }
}
