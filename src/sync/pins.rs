// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::models::{Coordinate, Pin, PinId};
use crate::store::LocalStore;

pub struct PinSyncEngine {
    store: Arc<dyn LocalStore>,
}

impl PinSyncEngine {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Drop a pin at `coordinate`. Out-of-range coordinates are rejected before touching the store.
    pub async fn create_pin(&self, coordinate: Coordinate) -> Result<Pin> {
        if let Err(e) = coordinate.validate() {
            warn!(error = %e, "Rejected pin");
            return Err(e);
        }

        let pin = self.store.insert_pin(coordinate).await?;
        info!(
            pin_id = %pin.id,
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            "Pin dropped"
        );
        Ok(pin)
    }

    /// Remove a pin and all of its photos
    pub async fn delete_pin(&self, pin_id: PinId) -> Result<()> {
        if !self.store.delete_pin(pin_id).await? {
            warn!(pin_id = %pin_id, "Pin to delete was not found");
        }
        Ok(())
    }

    pub async fn list_pins(&self) -> Result<Vec<Pin>> {
        self.store.list_pins().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::store::models::NewPhoto;
    use crate::store::SqliteStore;
    use crate::test_helpers::setup_test_store;

    async fn setup() -> (Arc<SqliteStore>, PinSyncEngine) {
        let store = Arc::new(setup_test_store().await);
        let engine = PinSyncEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (_store, engine) = setup().await;
        let coordinate = Coordinate {
            latitude: -33.8688,
            longitude: 151.2093,
        };

        let pin = engine.create_pin(coordinate).await.unwrap();
        let pins = engine.list_pins().await.unwrap();

        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].id, pin.id);
        assert_eq!(pins[0].coordinate, coordinate);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_coordinate() {
        let (_store, engine) = setup().await;

        for (latitude, longitude) in [(91.0, 0.0), (-90.1, 0.0), (0.0, 181.0), (0.0, -200.0)] {
            let result = engine.create_pin(Coordinate { latitude, longitude }).await;
            assert!(matches!(result, Err(SyncError::InvalidCoordinate { .. })));
        }
        assert!(engine.list_pins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_pin_removes_photos() {
        let (store, engine) = setup().await;
        let pin = engine
            .create_pin(Coordinate {
                latitude: 40.7128,
                longitude: -74.006,
            })
            .await
            .unwrap();
        store
            .insert_photos(vec![
                NewPhoto::new(pin.id, "http://a/1.jpg"),
                NewPhoto::new(pin.id, "http://a/2.jpg"),
            ])
            .await
            .unwrap();

        engine.delete_pin(pin.id).await.unwrap();

        assert!(engine.list_pins().await.unwrap().is_empty());
        assert!(store.photos_for_pin(pin.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_pin_is_ok() {
        let (_store, engine) = setup().await;
        engine.delete_pin(PinId(3)).await.unwrap();
    }
}
