//! The `Fetch` seam used for every remote read, and its blocking HTTP implementation.

use crate::fetch::error::FetchError;
use log::{info, warn};
use reqwest::blocking::Client;

/// Retrieves the body of a URL.
///
/// Everything that talks to the outside world (trip archives, GBFS feeds) goes through
/// this trait, so it can be swapped for [`crate::MockFetcher`] when working offline.
pub trait Fetch: Send + Sync {
    /// Performs a blocking GET of `url` and returns the full response body.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`Fetch`] implementation backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .gzip(true)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Wraps an already configured client, e.g. one with custom timeouts or proxies.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetch for HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let body = response
            .bytes()
            .map_err(|e| FetchError::ResponseBody(url.to_string(), e))?;
        info!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
