// SPDX-License-Identifier: GPL-3.0-only
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Shared reqwest client; one connection pool for searches and image fetches
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pin-album/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and return the whole body. Non-2xx responses are errors.
    pub async fn get_bytes(&self, url: Url) -> reqwest::Result<Vec<u8>> {
        debug!(url = %url, "GET");

        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;

        let content = response.bytes().await?;
        Ok(content.to_vec())
    }
}
