// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting anything outside the map
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self { latitude, longitude };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Latitude must lie in [-90, 90] and longitude in [-180, 180]. NaN fails both.
    pub fn validate(&self) -> Result<()> {
        if (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude) {
            Ok(())
        } else {
            Err(SyncError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// Stable identifier assigned by the store
    pub id: PinId,

    /// Map coordinate, fixed at creation
    pub coordinate: Coordinate,

    /// When the pin was dropped
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,

    /// Owning pin
    pub pin_id: PinId,

    /// Remote image URL returned by the search
    pub source_url: String,

    /// Raw image bytes, absent until fetched
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoState {
    PendingImage,
    Ready,
}

impl Photo {
    pub fn state(&self) -> PhotoState {
        if self.image_data.is_some() {
            PhotoState::Ready
        } else {
            PhotoState::PendingImage
        }
    }
}

/// A photo placeholder waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub pin_id: PinId,
    pub source_url: String,
}

impl NewPhoto {
    pub fn new(pin_id: PinId, source_url: impl Into<String>) -> Self {
        Self {
            pin_id,
            source_url: source_url.into(),
        }
    }
}

/// Last visible map region, restored on startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub span_latitude: f64,
    pub span_longitude: f64,
}
