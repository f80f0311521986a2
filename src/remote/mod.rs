// SPDX-License-Identifier: GPL-3.0-only
pub mod client;
pub mod search;
pub mod traits;

pub use client::HttpClient;
pub use search::{HttpPhotoSearchClient, DEFAULT_SEARCH_ENDPOINT};
pub use traits::RemotePhotoSearchClient;
