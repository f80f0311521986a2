// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use pin_album::config::Config;
use pin_album::logging::setup_logging;
use pin_album::remote::{HttpPhotoSearchClient, RemotePhotoSearchClient};
use pin_album::store::{LocalStore, SqliteStore};
use pin_album::sync::{LoadOutcome, PhotoSyncEngine, PinSyncEngine, SlotId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level)?;

    info!("Starting pin-album v{}", env!("CARGO_PKG_VERSION"));

    // Initialize store
    let store = Arc::new(SqliteStore::open(&config.store_db_path).await?);
    info!("Store opened at {}", config.store_db_path.display());

    match store.load_region().await? {
        Some(region) => info!(
            center_latitude = region.center_latitude,
            center_longitude = region.center_longitude,
            span_latitude = region.span_latitude,
            span_longitude = region.span_longitude,
            "Restored map region"
        ),
        None => info!("No saved map region"),
    }

    if config.search_api_key.is_empty() {
        warn!("No search API key configured; searches will likely be rejected");
    }

    let remote: Arc<dyn RemotePhotoSearchClient> = Arc::new(HttpPhotoSearchClient::new(
        &config.search_api_url,
        config.search_api_key.clone(),
        config.request_timeout(),
    )?);
    let local: Arc<dyn LocalStore> = store.clone();
    let pins = PinSyncEngine::new(Arc::clone(&local));
    let photos = PhotoSyncEngine::new(local, remote);

    tokio::select! {
        result = prefetch(store.as_ref(), &pins, &photos) => {
            result?;
            info!("Prefetch complete");
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
                Err(err) => error!(error = %err, "Unable to listen for shutdown signal"),
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Populate every pin's album and download any image still missing
async fn prefetch(
    store: &dyn LocalStore,
    pins: &PinSyncEngine,
    photos: &PhotoSyncEngine,
) -> anyhow::Result<()> {
    let all_pins = pins.list_pins().await?;
    info!(pins = all_pins.len(), "Prefetching photos");

    let mut next_slot = 0u64;
    for pin in all_pins {
        match photos.ensure_photos_loaded(pin.id).await {
            Ok(LoadOutcome::AlreadyLoaded(count)) => {
                info!(pin_id = %pin.id, photos = count, "Photos already stored");
            }
            Ok(LoadOutcome::Fetched(count)) => {
                info!(pin_id = %pin.id, photos = count, "Photos fetched");
            }
            Err(e) => {
                warn!(pin_id = %pin.id, error = %e, "{}", e.user_message());
                continue;
            }
        }

        let mut loads = Vec::new();
        for photo in store.photos_for_pin(pin.id).await? {
            let slot = SlotId(next_slot);
            next_slot += 1;
            match photos.ensure_image_loaded(slot, photo.id).await {
                Ok(load) => loads.push(load),
                Err(e) => warn!(photo_id = %photo.id, error = %e, "Image load not started"),
            }
        }

        for load in loads {
            let slot = load.slot();
            let photo_id = load.photo_id();
            if let Err(e) = load.wait().await {
                warn!(photo_id = %photo_id, error = %e, "{}", e.user_message());
            }
            photos.release_slot(slot).await;
        }
    }

    Ok(())
}
