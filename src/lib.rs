// SPDX-License-Identifier: GPL-3.0-only
//! Map pins with a location-based photo album per pin.
//!
//! Pins and their photo placeholders live in a local SQLite store; photo
//! URLs come from a remote search service and image bytes are fetched lazily,
//! one request per display slot.

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_helpers;

pub use error::{Result, SyncError};
