// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::remote::RemotePhotoSearchClient;
use crate::store::models::{NewPhoto, Photo, PhotoId, PhotoState, PinId};
use crate::store::LocalStore;
use crate::sync::slots::{ImageLoad, Slot, SlotId, SlotTable};

/// Upper bound on photos kept per pin; the album renders a fixed 3-column grid
pub const MAX_PHOTOS: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Photos were already stored; nothing was fetched
    AlreadyLoaded(usize),
    /// A search ran and this many placeholders were stored
    Fetched(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPhotoState {
    Empty,
    Populated { pending: usize, ready: usize },
}

pub struct PhotoSyncEngine {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemotePhotoSearchClient>,
    pin_gates: Mutex<HashMap<PinId, Arc<AsyncMutex<()>>>>,
    slots: SlotTable,
}

impl PhotoSyncEngine {
    pub fn new(store: Arc<dyn LocalStore>, remote: Arc<dyn RemotePhotoSearchClient>) -> Self {
        Self {
            store,
            remote,
            pin_gates: Mutex::new(HashMap::new()),
            slots: SlotTable::default(),
        }
    }

    fn pin_gate(&self, pin_id: PinId) -> Arc<AsyncMutex<()>> {
        let mut gates = self.pin_gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(pin_id).or_default())
    }

    /// Drop the pin's gate once no other caller holds a clone of it
    fn release_pin_gate(&self, pin_id: PinId, gate: Arc<AsyncMutex<()>>) {
        let mut gates = self.pin_gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if Arc::strong_count(&gate) == 2 {
            gates.remove(&pin_id);
        }
    }

    async fn with_pin_gate<F, Fut>(&self, pin_id: PinId, op: F) -> Result<LoadOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<LoadOutcome>>,
    {
        let gate = self.pin_gate(pin_id);
        let result = {
            let _guard = gate.lock().await;
            op().await
        };
        self.release_pin_gate(pin_id, gate);
        result
    }

    #[cfg(test)]
    fn pin_gate_count(&self) -> usize {
        self.pin_gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn pin_state(&self, pin_id: PinId) -> Result<PinPhotoState> {
        let photos = self.store.photos_for_pin(pin_id).await?;
        if photos.is_empty() {
            return Ok(PinPhotoState::Empty);
        }

        let ready = photos
            .iter()
            .filter(|photo| photo.state() == PhotoState::Ready)
            .count();
        Ok(PinPhotoState::Populated {
            pending: photos.len() - ready,
            ready,
        })
    }

    /// Make sure the pin has its photo placeholders, searching only when it has none.
    ///
    /// Calls for the same pin are serialized, so concurrent callers never
    /// commit two photo sets.
    pub async fn ensure_photos_loaded(&self, pin_id: PinId) -> Result<LoadOutcome> {
        self.with_pin_gate(pin_id, || self.load_photos_locked(pin_id)).await
    }

    /// Drop the pin's current photos and search again
    pub async fn refresh_photos(&self, pin_id: PinId) -> Result<LoadOutcome> {
        self.with_pin_gate(pin_id, || self.refresh_photos_locked(pin_id)).await
    }

    async fn refresh_photos_locked(&self, pin_id: PinId) -> Result<LoadOutcome> {
        let ids: Vec<PhotoId> = self
            .store
            .photos_for_pin(pin_id)
            .await?
            .iter()
            .map(|photo| photo.id)
            .collect();
        let removed = self.store.delete_photos(&ids).await?;
        info!(pin_id = %pin_id, removed, "Discarded photo collection");

        self.load_photos_locked(pin_id).await
    }

    async fn load_photos_locked(&self, pin_id: PinId) -> Result<LoadOutcome> {
        let pin = self
            .store
            .get_pin(pin_id)
            .await?
            .ok_or(SyncError::PinNotFound(pin_id))?;

        let existing = self.store.count_photos(pin_id).await?;
        if existing > 0 {
            debug!(pin_id = %pin_id, count = existing, "Photos already downloaded");
            return Ok(LoadOutcome::AlreadyLoaded(existing));
        }

        let urls = match self.remote.search(pin.coordinate).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(pin_id = %pin_id, error = %e, "Photo search failed");
                return Err(e);
            }
        };

        if urls.is_empty() {
            info!(pin_id = %pin_id, "No photos available for this location");
            return Err(SyncError::NoPhotosFound);
        }

        let found = urls.len();
        let batch: Vec<NewPhoto> = urls
            .into_iter()
            .take(MAX_PHOTOS)
            .map(|url| NewPhoto::new(pin_id, url))
            .collect();
        let inserted = match self.store.insert_photos(batch).await {
            Ok(inserted) => inserted,
            // The pin may have been deleted while the search was running
            Err(SyncError::Validation(cause)) => {
                if self.store.get_pin(pin_id).await?.is_none() {
                    info!(pin_id = %pin_id, "Pin deleted during photo search");
                    return Err(SyncError::PinNotFound(pin_id));
                }
                return Err(SyncError::Validation(cause));
            }
            Err(e) => return Err(e),
        };

        info!(pin_id = %pin_id, found, kept = inserted.len(), "Stored photo placeholders");
        Ok(LoadOutcome::Fetched(inserted.len()))
    }

    /// Remove the user's selected photos
    pub async fn delete_photos(&self, ids: &[PhotoId]) -> Result<usize> {
        self.store.delete_photos(ids).await
    }

    /// Bind `photo_id` to `slot`, cancelling whatever the slot was loading.
    ///
    /// Stored bytes come back without a fetch. Otherwise the image is fetched
    /// on a background task and written to the store, unless the load is
    /// cancelled first.
    pub async fn ensure_image_loaded(
        &self,
        slot_id: SlotId,
        photo_id: PhotoId,
    ) -> Result<ImageLoad> {
        let mut photo = self
            .store
            .get_photo(photo_id)
            .await?
            .ok_or(SyncError::PhotoNotFound(photo_id))?;

        let slot = self.slots.get_or_create(slot_id);
        let mut current = slot.current.lock().await;
        if let Some(previous) = current.take() {
            previous.cancel();
            debug!(slot = %slot_id, "Cancelled previous image load");
        }

        if let Some(bytes) = photo.image_data.take() {
            return Ok(ImageLoad::ready(slot_id, photo_id, bytes));
        }

        let token = CancellationToken::new();
        *current = Some(token.clone());

        let task = tokio::spawn(load_image(
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            Arc::clone(&slot),
            token.clone(),
            photo,
        ));
        drop(current);

        Ok(ImageLoad::pending(slot_id, photo_id, token, slot, task))
    }

    /// Forget a slot that went off screen, cancelling its load
    pub async fn release_slot(&self, slot_id: SlotId) {
        if let Some(slot) = self.slots.remove(slot_id) {
            if let Some(token) = slot.current.lock().await.take() {
                token.cancel();
                debug!(slot = %slot_id, "Released slot with a load in flight");
            }
        }
    }
}

async fn load_image(
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemotePhotoSearchClient>,
    slot: Arc<Slot>,
    token: CancellationToken,
    photo: Photo,
) -> Result<Vec<u8>> {
    let _in_flight = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(SyncError::Cancelled),
        guard = slot.in_flight.lock() => guard,
    };

    // Another slot may have finished this photo while we queued
    match store.get_photo(photo.id).await? {
        None => return Err(SyncError::PhotoNotFound(photo.id)),
        Some(Photo {
            image_data: Some(bytes),
            ..
        }) => return Ok(bytes),
        Some(_) => {}
    }

    let bytes = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(photo_id = %photo.id, "Image fetch cancelled");
            return Err(SyncError::Cancelled);
        }
        result = remote.fetch_bytes(&photo.source_url) => result?,
    };

    let _current = slot.current.lock().await;
    if token.is_cancelled() {
        debug!(photo_id = %photo.id, "Discarding image bytes for cancelled load");
        return Err(SyncError::Cancelled);
    }

    if store.set_image_data(photo.id, &bytes).await? {
        info!(photo_id = %photo.id, bytes = bytes.len(), "Image downloaded");
        return Ok(bytes);
    }

    store
        .get_photo(photo.id)
        .await?
        .and_then(|stored| stored.image_data)
        .ok_or(SyncError::PhotoNotFound(photo.id))
}
