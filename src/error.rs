// SPDX-License-Identifier: GPL-3.0-only
use crate::store::models::{PhotoId, PinId};

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Photo search failed: {cause}")]
    SearchFailed { cause: String },

    #[error("No photos found for this location")]
    NoPhotosFound,

    #[error("Image fetch failed: {cause}")]
    FetchFailed { cause: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    #[error("Photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("Image load cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl SyncError {
    pub fn search_failed(cause: impl std::fmt::Display) -> Self {
        Self::SearchFailed { cause: cause.to_string() }
    }

    pub fn fetch_failed(cause: impl std::fmt::Display) -> Self {
        Self::FetchFailed { cause: cause.to_string() }
    }

    /// Message suitable for showing in the photo album UI
    pub fn user_message(&self) -> String {
        match self {
            SyncError::InvalidCoordinate { .. } => "That location is not on the map.".to_string(),
            SyncError::SearchFailed { .. } => "Can't get photos. Try again later.".to_string(),
            SyncError::NoPhotosFound => "No photos available for this location.".to_string(),
            SyncError::FetchFailed { .. } => "Couldn't download this photo.".to_string(),
            SyncError::Validation(msg) => msg.clone(),
            SyncError::PinNotFound(_) => "This pin no longer exists.".to_string(),
            SyncError::PhotoNotFound(_) => "This photo no longer exists.".to_string(),
            SyncError::Cancelled => String::new(),
            SyncError::Storage(_) => "A database error occurred. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_failed_keeps_cause() {
        let err = SyncError::search_failed("connection reset");
        assert_eq!(err.to_string(), "Photo search failed: connection reset");
        assert!(matches!(
            err,
            SyncError::SearchFailed { ref cause } if cause == "connection reset"
        ));
    }

    #[test]
    fn test_no_photos_is_informational() {
        let err = SyncError::NoPhotosFound;
        assert_eq!(err.user_message(), "No photos available for this location.");
    }

    #[test]
    fn test_validation_message_passthrough() {
        let err = SyncError::Validation("photo 2 has an empty source url".to_string());
        assert_eq!(err.user_message(), "photo 2 has an empty source url");
    }
}
