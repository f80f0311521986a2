// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod observer;
pub mod settings;
pub mod sqlite;
pub mod traits;

pub use models::{Coordinate, MapRegion, NewPhoto, Photo, PhotoId, PhotoState, Pin, PinId};
pub use observer::{ChangeObserver, ChangeSet, RecordFilter, RecordId};
pub use sqlite::SqliteStore;
pub use traits::LocalStore;
