// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;

use crate::error::Result;
use crate::store::models::{Coordinate, NewPhoto, Photo, PhotoId, Pin, PinId};
use crate::store::observer::{ChangeObserver, RecordFilter};

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert a new pin at the given coordinate
    async fn insert_pin(&self, coordinate: Coordinate) -> Result<Pin>;

    /// Get a pin by ID
    async fn get_pin(&self, id: PinId) -> Result<Option<Pin>>;

    /// List all pins in insertion order
    async fn list_pins(&self) -> Result<Vec<Pin>>;

    /// Delete a pin together with all of its photos.
    /// Returns false when the pin did not exist
    async fn delete_pin(&self, id: PinId) -> Result<bool>;

    /// Photos owned by a pin, in insertion order
    async fn photos_for_pin(&self, pin_id: PinId) -> Result<Vec<Photo>>;

    /// Number of photos owned by a pin
    async fn count_photos(&self, pin_id: PinId) -> Result<usize>;

    /// Get a photo by ID
    async fn get_photo(&self, id: PhotoId) -> Result<Option<Photo>>;

    /// Insert a batch of photo placeholders in one commit.
    /// A single malformed record rejects the whole batch
    async fn insert_photos(&self, batch: Vec<NewPhoto>) -> Result<Vec<Photo>>;

    /// Store fetched image bytes. Returns false if the photo already had bytes
    async fn set_image_data(&self, id: PhotoId, bytes: &[u8]) -> Result<bool>;

    /// Delete the given photos in one commit, returning how many existed
    async fn delete_photos(&self, ids: &[PhotoId]) -> Result<usize>;

    /// Subscribe to commits touching records matched by `filter`
    fn observe(&self, filter: RecordFilter) -> ChangeObserver;
}
