// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;

use crate::error::Result;
use crate::store::models::Coordinate;

/// Remote photo service. Both calls are plain futures: dropping one
/// aborts that request without touching any other in flight.
#[async_trait]
pub trait RemotePhotoSearchClient: Send + Sync {
    /// Image URLs of photos taken near `coordinate`, in service order
    async fn search(&self, coordinate: Coordinate) -> Result<Vec<String>>;

    /// Raw bytes of a single image
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}
