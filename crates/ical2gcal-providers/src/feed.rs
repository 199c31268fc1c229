//! ICS feed download.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Downloads an ICS feed over HTTP(S) and hands back its body as text.
#[derive(Debug)]
pub struct FeedFetcher {
    http_client: reqwest::Client,
}

impl FeedFetcher {
    /// Creates a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self { http_client }
    }

    /// Fetches the feed and returns the raw body.
    ///
    /// The body must decode as UTF-8; anything else is rejected, even
    /// when the Content-Type header advertises another charset. Scanning
    /// and field extraction happen in `ical2gcal-core`.
    pub async fn fetch(&self, url: &Url) -> ProviderResult<String> {
        debug!("fetching feed from {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::network("feed request timeout")
                } else if e.is_connect() {
                    ProviderError::network(format!("connection failed: {}", e))
                } else {
                    ProviderError::network(format!("feed request failed: {}", e))
                }
                .with_provider("feed")
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ProviderError::server(format!("feed returned status {}", status))
                    .with_provider("feed"),
            );
        }

        let body = response.bytes().await.map_err(|e| {
            ProviderError::invalid_response(format!("failed to read feed body: {}", e))
                .with_provider("feed")
        })?;

        String::from_utf8(body.to_vec()).map_err(|e| {
            ProviderError::invalid_response(format!("feed body is not valid UTF-8: {}", e))
                .with_provider("feed")
        })
    }
}
