// SPDX-License-Identifier: GPL-3.0-only
pub mod photos;
pub mod pins;
pub mod slots;

pub use photos::{LoadOutcome, PhotoSyncEngine, PinPhotoState, MAX_PHOTOS};
pub use pins::PinSyncEngine;
pub use slots::{ImageLoad, SlotId};
