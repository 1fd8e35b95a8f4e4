//! Where real-time feed documents come from: the live GBFS endpoints or a saved snapshot.

use crate::fetch::client::Fetch;
use crate::realtime::error::RealtimeError;
use crate::realtime::snapshot::{snapshot_dir, SnapshotId};
use crate::types::gbfs::{Discovery, FeedEnvelope};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Resolves feed documents either live, through the discovery document, or from a
/// snapshot directory when a snapshot id is set.
///
/// Cheap to clone; clones share the underlying fetcher.
#[derive(Clone)]
pub struct FeedSource {
    discovery_url: String,
    snapshots_dir: PathBuf,
    language: String,
    snapshot: Option<SnapshotId>,
    fetcher: Arc<dyn Fetch>,
}

impl fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSource")
            .field("discovery_url", &self.discovery_url)
            .field("snapshots_dir", &self.snapshots_dir)
            .field("language", &self.language)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl FeedSource {
    pub fn new(
        discovery_url: impl Into<String>,
        snapshots_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            snapshots_dir: snapshots_dir.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            snapshot: None,
            fetcher,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Binds the source to a saved snapshot, or to the live feeds with `None`.
    pub fn with_snapshot(mut self, snapshot: Option<SnapshotId>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    pub fn snapshots_dir(&self) -> &Path {
        &self.snapshots_dir
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn snapshot(&self) -> Option<&SnapshotId> {
        self.snapshot.as_ref()
    }

    pub(crate) fn set_snapshot(&mut self, snapshot: Option<SnapshotId>) {
        self.snapshot = snapshot;
    }

    /// Fetches `url` and deserializes the body.
    pub fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RealtimeError> {
        let bytes = self.fetcher.get_bytes(url)?;
        serde_json::from_slice(&bytes).map_err(|e| RealtimeError::JsonParse {
            origin: url.to_string(),
            source: e,
        })
    }

    /// Fetches the discovery document. Always live, even when bound to a snapshot.
    pub fn discover(&self) -> Result<FeedEnvelope<Discovery>, RealtimeError> {
        self.fetch_json(&self.discovery_url)
    }

    /// Feed name to URL for the configured language, from a fresh discovery document.
    pub fn feed_urls(&self) -> Result<HashMap<String, String>, RealtimeError> {
        let discovery = self.discover()?;
        discovery
            .data
            .get(&self.language)
            .map(|feeds| feeds.url_map())
            .ok_or_else(|| RealtimeError::LanguageNotListed(self.language.clone()))
    }

    /// Directory of the bound snapshot, failing with [`RealtimeError::SnapshotNotFound`]
    /// if it does not exist. `None` when the source is live.
    pub fn snapshot_path(&self) -> Result<Option<PathBuf>, RealtimeError> {
        let Some(id) = &self.snapshot else {
            return Ok(None);
        };
        let path = snapshot_dir(&self.snapshots_dir, id);
        if !path.is_dir() {
            return Err(RealtimeError::SnapshotNotFound(
                id.clone(),
                self.snapshots_dir.clone(),
            ));
        }
        Ok(Some(path))
    }

    /// Loads the feed called `name`: from `{snapshot}/{name}.json` when bound to a
    /// snapshot, otherwise by looking the name up in discovery and fetching it.
    pub fn load_feed<T: DeserializeOwned>(&self, name: &str) -> Result<T, RealtimeError> {
        if let Some(dir) = self.snapshot_path()? {
            let file = dir.join(format!("{}.json", name));
            debug!("Reading feed {} from {}", name, file.display());
            let bytes = std::fs::read(&file)
                .map_err(|e| RealtimeError::SnapshotRead(file.clone(), e))?;
            return serde_json::from_slice(&bytes).map_err(|e| RealtimeError::JsonParse {
                origin: file.display().to_string(),
                source: e,
            });
        }

        let urls = self.feed_urls()?;
        let url = urls.get(name).ok_or_else(|| RealtimeError::FeedNotListed {
            feed: name.to_string(),
            language: self.language.clone(),
        })?;
        info!("Fetching live feed {} from {}", name, url);
        self.fetch_json(url)
    }
}
