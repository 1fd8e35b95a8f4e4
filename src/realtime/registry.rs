//! The GBFS discovery registry: which feeds exist, where they live, and saving all of
//! them as a snapshot.

use crate::realtime::error::RealtimeError;
use crate::realtime::feeds::{StationInformation, StationStatus, SystemInformation};
use crate::realtime::snapshot::{snapshot_dir, SnapshotId};
use crate::realtime::source::FeedSource;
use crate::types::gbfs::Discovery;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Entry point to the real-time feeds.
///
/// Holds the discovery document (fetched on first use) and the snapshot the registry is
/// bound to, if any. `last_update_time` and `ttl` are the publisher's hints and are
/// never used to refresh anything automatically.
#[derive(Debug)]
pub struct FeedRegistry {
    source: FeedSource,
    last_update_time: Option<i64>,
    ttl: Option<i64>,
    saved: bool,
    url_map: Option<Discovery>,
    feeds: Option<HashMap<String, String>>,
}

impl FeedRegistry {
    /// Creates a registry reading through `source`. Discovery is fetched on first use.
    pub fn new(source: FeedSource) -> Self {
        Self {
            source,
            last_update_time: None,
            ttl: None,
            saved: false,
            url_map: None,
            feeds: None,
        }
    }

    /// The feed source, bound to the current snapshot if there is one.
    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// The snapshot the registry reads from, `None` when live.
    pub fn snapshot(&self) -> Option<&SnapshotId> {
        self.source.snapshot()
    }

    /// `last_updated` of the discovery document, once fetched.
    pub fn last_update_time(&self) -> Option<i64> {
        self.last_update_time
    }

    /// `ttl` of the discovery document in seconds, once fetched.
    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    /// Whether [`Self::save`] has completed on this registry.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Fetches the discovery document and caches its url map and the feeds of the
    /// configured language.
    pub fn update(&mut self) -> Result<(), RealtimeError> {
        let discovery = self.source.discover()?;
        let language = self.source.language();
        let feeds = discovery
            .data
            .get(language)
            .map(|feeds| feeds.url_map())
            .ok_or_else(|| RealtimeError::LanguageNotListed(language.to_string()))?;

        self.last_update_time = Some(discovery.last_updated);
        self.ttl = Some(discovery.ttl);
        self.url_map = Some(discovery.data);
        self.feeds = Some(feeds);
        Ok(())
    }

    /// Language code to feed list, as published.
    pub fn url_map(&mut self) -> Result<&Discovery, RealtimeError> {
        if self.url_map.is_none() {
            self.update()?;
        }
        self.url_map
            .as_ref()
            .ok_or_else(|| RealtimeError::LanguageNotListed(self.source.language().to_string()))
    }

    /// Feed name to URL for the configured language.
    pub fn feeds(&mut self) -> Result<&HashMap<String, String>, RealtimeError> {
        if self.feeds.is_none() {
            self.update()?;
        }
        self.feeds
            .as_ref()
            .ok_or_else(|| RealtimeError::LanguageNotListed(self.source.language().to_string()))
    }

    /// Directory of the bound snapshot. With no snapshot bound this saves a new one
    /// first, so the returned directory always exists.
    pub fn snapshot_path(&mut self) -> Result<PathBuf, RealtimeError> {
        if let Some(path) = self.source.snapshot_path()? {
            return Ok(path);
        }
        let id = self.save()?;
        Ok(snapshot_dir(self.source.snapshots_dir(), &id))
    }

    /// Captures every feed listed for the configured language into a new snapshot
    /// directory and binds the registry to it.
    ///
    /// Feeds are written in name order, each as the exact document fetched. A failure
    /// part way leaves the files written so far in place.
    pub fn save(&mut self) -> Result<SnapshotId, RealtimeError> {
        self.source.set_snapshot(None);
        let id = SnapshotId::now();
        info!("New snapshot at {}.", id);

        let feeds: BTreeMap<String, String> = self
            .feeds()?
            .iter()
            .map(|(name, url)| (name.clone(), url.clone()))
            .collect();

        let dir = snapshot_dir(self.source.snapshots_dir(), &id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| RealtimeError::SnapshotDirCreation(dir.clone(), e))?;
        for (name, url) in &feeds {
            let document: serde_json::Value = self.source.fetch_json(url)?;
            write_json(&dir.join(format!("{}.json", name)), &document)?;
        }
        info!("Saved {} feeds to {}", feeds.len(), dir.display());

        self.source.set_snapshot(Some(id.clone()));
        self.saved = true;
        Ok(id)
    }

    /// One wrapper per consumed feed, all bound to this registry's snapshot (or live).
    pub fn datasets(&self) -> Datasets {
        Datasets {
            system_information: SystemInformation::new(self.source.clone()),
            station_information: StationInformation::new(self.source.clone()),
            station_status: StationStatus::new(self.source.clone()),
        }
    }
}

/// The consumed feeds of one registry.
pub struct Datasets {
    pub system_information: SystemInformation,
    pub station_information: StationInformation,
    pub station_status: StationStatus,
}

impl Datasets {
    /// Hands station information's id to name lookup to station status, so it is not
    /// loaded a second time.
    pub fn share_id_name_lookup(&mut self) -> Result<(), RealtimeError> {
        let lookup = self.station_information.id_name_lookup()?.clone();
        self.station_status.set_id_name_lookup(lookup);
        Ok(())
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), RealtimeError> {
    let file =
        std::fs::File::create(path).map_err(|e| RealtimeError::SnapshotWrite(path.to_path_buf(), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| RealtimeError::SnapshotEncode(path.to_path_buf(), e))?;
    writer
        .flush()
        .map_err(|e| RealtimeError::SnapshotWrite(path.to_path_buf(), e))
}
