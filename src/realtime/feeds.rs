//! Typed wrappers around the three GBFS feeds this crate consumes.
//!
//! All of them share [`FeedSnapshot`], which loads a feed from its [`FeedSource`] on first
//! access and keeps it for the lifetime of the object. Nothing is shared between
//! instances: building a new wrapper means loading the feed again.

use crate::realtime::error::RealtimeError;
use crate::realtime::source::FeedSource;
use crate::types::gbfs::{
    FeedEnvelope, StationInformationRecord, StationList, StationStatusRecord,
    SystemInformationData,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;

/// A named GBFS feed and the payload type it carries.
pub trait GbfsFeed {
    /// Feed name as listed in the discovery document, and the snapshot file stem.
    const NAME: &'static str;
    type Data: DeserializeOwned;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemInformationFeed;

impl GbfsFeed for SystemInformationFeed {
    const NAME: &'static str = "system_information";
    type Data = SystemInformationData;
}

#[derive(Debug, Clone, Copy)]
pub struct StationInformationFeed;

impl GbfsFeed for StationInformationFeed {
    const NAME: &'static str = "station_information";
    type Data = StationList<StationInformationRecord>;
}

#[derive(Debug, Clone, Copy)]
pub struct StationStatusFeed;

impl GbfsFeed for StationStatusFeed {
    const NAME: &'static str = "station_status";
    type Data = StationList<StationStatusRecord>;
}

/// Lazily loaded contents of feed `F`.
pub struct FeedSnapshot<F: GbfsFeed> {
    source: FeedSource,
    envelope: Option<FeedEnvelope<F::Data>>,
    _feed: PhantomData<F>,
}

impl<F: GbfsFeed> FeedSnapshot<F> {
    pub fn new(source: FeedSource) -> Self {
        Self {
            source,
            envelope: None,
            _feed: PhantomData,
        }
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// Loads the feed again, replacing whatever was cached.
    pub fn update(&mut self) -> Result<&FeedEnvelope<F::Data>, RealtimeError> {
        let envelope = self.source.load_feed::<FeedEnvelope<F::Data>>(F::NAME)?;
        Ok(self.envelope.insert(envelope))
    }

    /// The feed document, loading it on first access.
    pub fn data(&mut self) -> Result<&FeedEnvelope<F::Data>, RealtimeError> {
        let envelope = match self.envelope.take() {
            Some(envelope) => envelope,
            None => self.source.load_feed::<FeedEnvelope<F::Data>>(F::NAME)?,
        };
        Ok(self.envelope.insert(envelope))
    }

    /// Publisher's last update time, once loaded.
    pub fn last_updated(&self) -> Option<i64> {
        self.envelope.as_ref().map(|e| e.last_updated)
    }

    /// Publisher's time-to-live hint in seconds, once loaded.
    pub fn ttl(&self) -> Option<i64> {
        self.envelope.as_ref().map(|e| e.ttl)
    }
}

impl<F, R> FeedSnapshot<F>
where
    F: GbfsFeed<Data = StationList<R>>,
{
    /// Station records of the feed, loading it on first access.
    pub fn stations(&mut self) -> Result<&[R], RealtimeError> {
        Ok(&self.data()?.data.stations)
    }
}

pub type SystemInformation = FeedSnapshot<SystemInformationFeed>;

/// The `station_information` feed plus a cached station id to name lookup.
pub struct StationInformation {
    feed: FeedSnapshot<StationInformationFeed>,
    id_name_lookup: Option<HashMap<String, String>>,
}

impl StationInformation {
    pub fn new(source: FeedSource) -> Self {
        Self {
            feed: FeedSnapshot::new(source),
            id_name_lookup: None,
        }
    }

    pub fn update(
        &mut self,
    ) -> Result<&FeedEnvelope<StationList<StationInformationRecord>>, RealtimeError> {
        self.id_name_lookup = None;
        self.feed.update()
    }

    pub fn data(
        &mut self,
    ) -> Result<&FeedEnvelope<StationList<StationInformationRecord>>, RealtimeError> {
        self.feed.data()
    }

    pub fn stations(&mut self) -> Result<&[StationInformationRecord], RealtimeError> {
        self.feed.stations()
    }

    pub fn last_updated(&self) -> Option<i64> {
        self.feed.last_updated()
    }

    pub fn ttl(&self) -> Option<i64> {
        self.feed.ttl()
    }

    /// Station name to dock capacity. Stations publishing no capacity map to `None`.
    pub fn capacity(&mut self) -> Result<HashMap<String, Option<u32>>, RealtimeError> {
        Ok(self
            .stations()?
            .iter()
            .map(|s| (s.name.clone(), s.capacity))
            .collect())
    }

    /// Station id to station name.
    pub fn id_name_lookup(&mut self) -> Result<&HashMap<String, String>, RealtimeError> {
        let lookup = match self.id_name_lookup.take() {
            Some(lookup) => lookup,
            None => self
                .stations()?
                .iter()
                .map(|s| (s.station_id.clone(), s.name.clone()))
                .collect(),
        };
        Ok(self.id_name_lookup.insert(lookup))
    }

    /// The first station called `name`.
    ///
    /// Falls back to comparing [normalized](normalize_station_name) names when nothing
    /// matches exactly, since trip archives and the live feed do not always agree on
    /// whitespace, escaping or case.
    pub fn find_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<&StationInformationRecord>, RealtimeError> {
        let stations = self.stations()?;
        if let Some(exact) = stations.iter().find(|s| s.name == name) {
            return Ok(Some(exact));
        }
        let wanted = normalize_station_name(name);
        Ok(stations
            .iter()
            .find(|s| normalize_station_name(&s.name) == wanted))
    }
}

/// The `station_status` feed. Status records carry ids only; names come from
/// `station_information` through [`Self::id_name_lookup`].
pub struct StationStatus {
    feed: FeedSnapshot<StationStatusFeed>,
    id_name_lookup: Option<HashMap<String, String>>,
}

impl StationStatus {
    pub fn new(source: FeedSource) -> Self {
        Self {
            feed: FeedSnapshot::new(source),
            id_name_lookup: None,
        }
    }

    /// Supplies an id to name lookup so none has to be loaded.
    pub fn with_id_name_lookup(mut self, lookup: HashMap<String, String>) -> Self {
        self.set_id_name_lookup(lookup);
        self
    }

    pub fn set_id_name_lookup(&mut self, lookup: HashMap<String, String>) {
        self.id_name_lookup = Some(lookup);
    }

    pub fn update(
        &mut self,
    ) -> Result<&FeedEnvelope<StationList<StationStatusRecord>>, RealtimeError> {
        self.feed.update()
    }

    pub fn data(
        &mut self,
    ) -> Result<&FeedEnvelope<StationList<StationStatusRecord>>, RealtimeError> {
        self.feed.data()
    }

    pub fn stations(&mut self) -> Result<&[StationStatusRecord], RealtimeError> {
        self.feed.stations()
    }

    pub fn last_updated(&self) -> Option<i64> {
        self.feed.last_updated()
    }

    pub fn ttl(&self) -> Option<i64> {
        self.feed.ttl()
    }

    /// The first status record for station `id`.
    pub fn find_by_id(&mut self, id: &str) -> Result<Option<&StationStatusRecord>, RealtimeError> {
        Ok(self.stations()?.iter().find(|s| s.station_id == id))
    }

    /// Station id to station name, read from the `station_information` feed of the same
    /// source unless one was supplied.
    pub fn id_name_lookup(&mut self) -> Result<&HashMap<String, String>, RealtimeError> {
        let lookup = match self.id_name_lookup.take() {
            Some(lookup) => lookup,
            None => {
                let mut information = StationInformation::new(self.feed.source().clone());
                information.id_name_lookup()?.clone()
            }
        };
        Ok(self.id_name_lookup.insert(lookup))
    }
}

/// Canonical form of a station name for fuzzy joins: backslash escapes dropped,
/// whitespace runs collapsed to one space, trimmed, lowercased.
pub fn normalize_station_name(name: &str) -> String {
    name.replace('\\', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use serde_json::json;
    use std::sync::Arc;

    const DISCOVERY: &str = "https://gbfs.test/gbfs.json";

    fn mock_source() -> (Arc<MockFetcher>, FeedSource) {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_json(
                    DISCOVERY,
                    &json!({
                        "last_updated": 1700000000, "ttl": 5,
                        "data": {"en": {"feeds": [
                            {"name": "system_information", "url": "https://gbfs.test/si.json"},
                            {"name": "station_information", "url": "https://gbfs.test/info.json"},
                            {"name": "station_status", "url": "https://gbfs.test/status.json"}
                        ]}}
                    }),
                )
                .with_json(
                    "https://gbfs.test/si.json",
                    &json!({
                        "last_updated": 1700000001, "ttl": 60,
                        "data": {"system_id": "NYC", "language": "en", "name": "Citi Bike",
                                 "timezone": "America/New_York"}
                    }),
                )
                .with_json(
                    "https://gbfs.test/info.json",
                    &json!({
                        "last_updated": 1700000002, "ttl": 5,
                        "data": {"stations": [
                            {"station_id": "a1", "name": "W 21 St & 6 Ave", "lat": 40.74, "lon": -73.99, "capacity": 55},
                            {"station_id": "b2", "name": "Broadway & E 14 St", "lat": 40.73, "lon": -73.99},
                            {"station_id": "c3", "name": "Clinton St & Joralemon St", "lat": 40.69, "lon": -73.99, "capacity": 24}
                        ]}
                    }),
                )
                .with_json(
                    "https://gbfs.test/status.json",
                    &json!({
                        "last_updated": 1700000003, "ttl": 5,
                        "data": {"stations": [
                            {"station_id": "a1", "num_bikes_available": 10, "num_docks_available": 45},
                            {"station_id": "c3", "num_bikes_available": 0, "num_docks_available": 24}
                        ]}
                    }),
                ),
        );
        let root = std::env::temp_dir();
        let source = FeedSource::new(DISCOVERY, root, fetcher.clone());
        (fetcher, source)
    }

    #[test]
    fn test_system_information_loads_once() -> Result<(), Box<dyn std::error::Error>> {
        let (fetcher, source) = mock_source();
        let mut info = SystemInformation::new(source);
        assert_eq!(info.last_updated(), None);

        assert_eq!(info.data()?.data.name, "Citi Bike");
        assert_eq!(info.data()?.data.timezone, "America/New_York");
        assert_eq!(info.last_updated(), Some(1700000001));
        assert_eq!(info.ttl(), Some(60));

        // discovery + feed, once
        assert_eq!(fetcher.requests().len(), 2);
        Ok(())
    }

    #[test]
    fn test_capacity_and_lookup() -> Result<(), Box<dyn std::error::Error>> {
        let (_, source) = mock_source();
        let mut info = StationInformation::new(source);

        let capacity = info.capacity()?;
        assert_eq!(capacity.get("W 21 St & 6 Ave"), Some(&Some(55)));
        assert_eq!(capacity.get("Broadway & E 14 St"), Some(&None));

        let lookup = info.id_name_lookup()?;
        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.get("c3").map(String::as_str), Some("Clinton St & Joralemon St"));
        Ok(())
    }

    #[test]
    fn test_find_by_name_prefers_exact_then_normalized() -> Result<(), Box<dyn std::error::Error>>
    {
        let (_, source) = mock_source();
        let mut info = StationInformation::new(source);

        let exact = info.find_by_name("W 21 St & 6 Ave")?.map(|s| s.station_id.clone());
        assert_eq!(exact.as_deref(), Some("a1"));

        let fuzzy = info
            .find_by_name("  broadway  &  e 14 st ")?
            .map(|s| s.station_id.clone());
        assert_eq!(fuzzy.as_deref(), Some("b2"));

        assert!(info.find_by_name("Nowhere Plaza")?.is_none());
        Ok(())
    }

    #[test]
    fn test_status_lookup_comes_from_information() -> Result<(), Box<dyn std::error::Error>> {
        let (_, source) = mock_source();
        let mut status = StationStatus::new(source);

        let record = status.find_by_id("a1")?.cloned();
        assert_eq!(record.map(|r| r.num_bikes_available), Some(10));
        assert!(status.find_by_id("b2")?.is_none());

        let lookup = status.id_name_lookup()?;
        assert_eq!(lookup.get("a1").map(String::as_str), Some("W 21 St & 6 Ave"));
        Ok(())
    }

    #[test]
    fn test_supplied_lookup_is_used() -> Result<(), Box<dyn std::error::Error>> {
        let (fetcher, source) = mock_source();
        let lookup = HashMap::from([("z9".to_string(), "Somewhere".to_string())]);
        let mut status = StationStatus::new(source).with_id_name_lookup(lookup);

        assert_eq!(
            status.id_name_lookup()?.get("z9").map(String::as_str),
            Some("Somewhere")
        );
        assert!(fetcher.requests().is_empty());
        Ok(())
    }

    #[test]
    fn test_normalize_station_name() {
        assert_eq!(
            normalize_station_name("  St. Mark\\'s Pl  &  1 Ave "),
            "st. mark's pl & 1 ave"
        );
    }
}
