// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::{Result, SyncError};
use crate::remote::client::HttpClient;
use crate::remote::traits::RemotePhotoSearchClient;
use crate::store::models::Coordinate;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.flickr.com/services/rest";

const METHOD_SEARCH: &str = "flickr.photos.search";
// Flickr accuracy 16 is street level
const ACCURACY_STREET: &str = "16";
const SAFE_SEARCH_ON: &str = "1";
const EXTRAS_MEDIUM_URL: &str = "url_m";
const FORMAT_JSON: &str = "json";
const NO_JSON_CALLBACK: &str = "1";
const STATUS_OK: &str = "ok";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    stat: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    photos: Option<PhotoPage>,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    photo: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
struct PhotoEntry {
    #[serde(default)]
    url_m: Option<String>,
}

/// Photo search over the Flickr REST API
pub struct HttpPhotoSearchClient {
    http: HttpClient,
    endpoint: Url,
    api_key: String,
}

impl HttpPhotoSearchClient {
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        match endpoint.scheme() {
            "http" | "https" => {}
            scheme => anyhow::bail!("Unsupported search endpoint scheme: {}", scheme),
        }

        Ok(Self {
            http: HttpClient::new(timeout)?,
            endpoint,
            api_key,
        })
    }

    fn search_url(&self, coordinate: Coordinate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("method", METHOD_SEARCH)
            .append_pair("api_key", &self.api_key)
            .append_pair("accuracy", ACCURACY_STREET)
            .append_pair("safe_search", SAFE_SEARCH_ON)
            .append_pair("lat", &coordinate.latitude.to_string())
            .append_pair("lon", &coordinate.longitude.to_string())
            .append_pair("extras", EXTRAS_MEDIUM_URL)
            .append_pair("format", FORMAT_JSON)
            .append_pair("nojsoncallback", NO_JSON_CALLBACK);
        url
    }
}

/// Pull the medium-size URLs out of a search payload, keeping service order.
/// Entries without a `url_m` are skipped.
fn parse_search_response(body: &[u8]) -> Result<Vec<String>> {
    let response: SearchResponse = serde_json::from_slice(body)
        .map_err(|e| SyncError::search_failed(format!("Could not parse the data as JSON: {}", e)))?;

    if response.stat != STATUS_OK {
        let message = response.message.unwrap_or_else(|| "no message".to_string());
        return Err(SyncError::search_failed(format!(
            "service returned stat '{}': {}",
            response.stat, message
        )));
    }

    let page = response
        .photos
        .ok_or_else(|| SyncError::search_failed("response has no photo list"))?;

    Ok(page.photo.into_iter().filter_map(|entry| entry.url_m).collect())
}

#[async_trait]
impl RemotePhotoSearchClient for HttpPhotoSearchClient {
    async fn search(&self, coordinate: Coordinate) -> Result<Vec<String>> {
        info!(
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            "Searching photos near location"
        );

        let body = self
            .http
            .get_bytes(self.search_url(coordinate))
            .await
            .map_err(|e| {
                warn!(error = %e, "Photo search request failed");
                SyncError::search_failed(e)
            })?;

        let urls = parse_search_response(&body)?;
        info!(count = urls.len(), "Photo search returned");
        Ok(urls)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(url)
            .map_err(|e| SyncError::fetch_failed(format!("invalid url '{}': {}", url, e)))?;

        let bytes = self.http.get_bytes(url.clone()).await.map_err(|e| {
            warn!(url = %url, error = %e, "Image fetch failed");
            SyncError::fetch_failed(e)
        })?;

        if bytes.is_empty() {
            return Err(SyncError::fetch_failed(format!("empty body from {}", url)));
        }

        Ok(bytes)
    }
}
