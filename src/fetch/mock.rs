//! Mock fetcher for working without network access.
//!
//! Serves pre-registered bodies keyed by URL and remembers every URL it was asked for,
//! in order.

use crate::fetch::client::Fetch;
use crate::fetch::error::FetchError;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// A [`Fetch`] implementation that answers from an in-memory table of responses.
///
/// Unknown URLs fail with [`FetchError::NotAvailable`].
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw body for `url`.
    pub fn with_bytes(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }

    /// Registers a JSON document for `url`.
    pub fn with_json(self, url: impl Into<String>, body: &serde_json::Value) -> Self {
        self.with_bytes(url, body.to_string())
    }

    /// All URLs requested so far, oldest first. Failed requests are included.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Fetch for MockFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Mock fetch of {}", url);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotAvailable(url.to_string()))
    }
}
