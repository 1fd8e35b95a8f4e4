//! The main entry point: a client owning directories, endpoints and the fetcher, handing
//! out monthly trip data and real-time feed registries.

use crate::error::CitibikeError;
use crate::fetch::client::{Fetch, HttpFetcher};
use crate::realtime::registry::FeedRegistry;
use crate::realtime::snapshot::{latest_snapshot, list_snapshots, SnapshotId};
use crate::realtime::source::{FeedSource, DEFAULT_LANGUAGE};
use crate::trip_data::loader::{TripDataLoader, DEFAULT_ARCHIVE_NAME_VARIANTS, DEFAULT_TRIP_DATA_URL};
use crate::trip_data::trip_data::TripData;
use crate::types::year_month::YearMonth;
use crate::utils::{ensure_dir_exists, get_data_dir};
use bon::bon;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_GBFS_URL: &str = "http://gbfs.citibikenyc.com/gbfs/gbfs.json";

const TRIP_DATA_DIR_NAME: &str = "trip_data";
const SNAPSHOTS_DIR_NAME: &str = "snapshots";

/// The client for Citi Bike trip archives and real-time station feeds.
///
/// Trip CSVs are cached under `{data_folder}/trip_data`, feed snapshots under
/// `{data_folder}/snapshots`. Both directories are created on construction.
///
/// # Examples
///
/// ```no_run
/// use citibike::{Citibike, CitibikeError, YearMonth};
///
/// # fn main() -> Result<(), CitibikeError> {
/// let client = Citibike::new()?;
/// let mut trips = client.trip_data(YearMonth::new(2023, 1)?).call();
/// if let Some(station) = trips.find_station("W 21 St & 6 Ave")? {
///     let counts = station.trip_counts(Default::default())?;
///     println!("{}", counts);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Citibike {
    data_folder: PathBuf,
    trip_data_dir: PathBuf,
    snapshots_dir: PathBuf,
    gbfs_url: String,
    language: String,
    loader: TripDataLoader,
    fetcher: Arc<dyn Fetch>,
}

#[bon]
impl Citibike {
    /// Creates a client with the default data directory (`citibike_rs` in the user's data
    /// directory), the public endpoints and an HTTP fetcher.
    ///
    /// # Errors
    ///
    /// [`CitibikeError::DataDirResolution`] when no data directory can be determined,
    /// [`CitibikeError::DataDirCreation`] when it cannot be created and
    /// [`CitibikeError::Fetch`] when the HTTP client fails to build.
    pub fn new() -> Result<Self, CitibikeError> {
        Self::builder().build()
    }

    /// Creates a client with any of the defaults overridden.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.data_folder(PathBuf)`: root for the trip cache and snapshots.
    /// * `.trip_data_url(String)`: base URL of the trip archive bucket.
    /// * `.gbfs_url(String)`: URL of the GBFS discovery document.
    /// * `.archive_name_variants(Vec<String>)`: archive file name templates tried in order,
    ///   with `{month}` standing for `YYYYMM`.
    /// * `.language(String)`: language of the feeds to read from discovery (default `en`).
    /// * `.fetcher(Arc<dyn Fetch>)`: how URLs are retrieved, e.g. a [`MockFetcher`](crate::MockFetcher).
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use citibike::{Citibike, CitibikeError, MockFetcher};
    /// # use std::sync::Arc;
    /// # fn main() -> Result<(), CitibikeError> {
    /// let client = Citibike::builder()
    ///     .data_folder("/tmp/citibike".into())
    ///     .fetcher(Arc::new(MockFetcher::new()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = builder, finish_fn = build)]
    #[doc(hidden)]
    pub fn build_client(
        data_folder: Option<PathBuf>,
        trip_data_url: Option<String>,
        gbfs_url: Option<String>,
        archive_name_variants: Option<Vec<String>>,
        language: Option<String>,
        fetcher: Option<Arc<dyn Fetch>>,
    ) -> Result<Self, CitibikeError> {
        let data_folder = match data_folder {
            Some(folder) => folder,
            None => get_data_dir().map_err(CitibikeError::DataDirResolution)?,
        };
        let trip_data_dir = data_folder.join(TRIP_DATA_DIR_NAME);
        let snapshots_dir = data_folder.join(SNAPSHOTS_DIR_NAME);
        for dir in [&trip_data_dir, &snapshots_dir] {
            ensure_dir_exists(dir).map_err(|e| CitibikeError::DataDirCreation(dir.clone(), e))?;
        }

        let fetcher: Arc<dyn Fetch> = match fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        let loader = TripDataLoader::new(&trip_data_dir, fetcher.clone())
            .with_base_url(trip_data_url.unwrap_or_else(|| DEFAULT_TRIP_DATA_URL.to_string()))
            .with_archive_name_variants(archive_name_variants.unwrap_or_else(|| {
                DEFAULT_ARCHIVE_NAME_VARIANTS
                    .iter()
                    .map(|v| v.to_string())
                    .collect()
            }));

        Ok(Self {
            data_folder,
            trip_data_dir,
            snapshots_dir,
            gbfs_url: gbfs_url.unwrap_or_else(|| DEFAULT_GBFS_URL.to_string()),
            language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            loader,
            fetcher,
        })
    }

    /// Root directory holding `trip_data/` and `snapshots/`.
    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Where monthly trip CSVs are cached.
    pub fn trip_data_dir(&self) -> &Path {
        &self.trip_data_dir
    }

    /// Where feed snapshots are saved.
    pub fn snapshots_dir(&self) -> &Path {
        &self.snapshots_dir
    }

    /// A feed source for the configured discovery URL and language, reading from
    /// `snapshot` when given and live otherwise.
    pub fn feed_source(&self, snapshot: Option<SnapshotId>) -> FeedSource {
        FeedSource::new(&self.gbfs_url, &self.snapshots_dir, self.fetcher.clone())
            .with_language(&self.language)
            .with_snapshot(snapshot)
    }

    /// The trips of `month`. Nothing is read until the data is first used.
    ///
    /// Stations of the returned [`TripData`] join real-time records from `.snapshot(..)`
    /// when set, otherwise from the live feeds.
    #[builder(start_fn = trip_data)]
    #[doc(hidden)]
    pub fn build_trip_data(
        &self,
        #[builder(start_fn)] month: YearMonth,
        snapshot: Option<SnapshotId>,
    ) -> TripData {
        TripData::new(month, self.loader.clone(), self.feed_source(snapshot))
    }

    /// A feed registry, bound to `.snapshot(..)` when set.
    #[builder(start_fn = realtime)]
    #[doc(hidden)]
    pub fn build_realtime(&self, snapshot: Option<SnapshotId>) -> FeedRegistry {
        FeedRegistry::new(self.feed_source(snapshot))
    }

    /// Saved snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// [`CitibikeError::Realtime`] when the snapshots directory cannot be listed.
    pub fn snapshots(&self) -> Result<Vec<SnapshotId>, CitibikeError> {
        Ok(list_snapshots(&self.snapshots_dir)?)
    }

    /// The most recent saved snapshot, if any.
    pub fn latest_snapshot(&self) -> Result<Option<SnapshotId>, CitibikeError> {
        Ok(latest_snapshot(&self.snapshots_dir)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::realtime::error::RealtimeError;
    use serde_json::json;

    const DISCOVERY: &str = "https://gbfs.test/gbfs.json";
    const INFORMATION: &str = "https://gbfs.test/station_information.json";

    fn fetcher() -> Arc<MockFetcher> {
        Arc::new(
            MockFetcher::new()
                .with_json(
                    DISCOVERY,
                    &json!({
                        "last_updated": 1697040000, "ttl": 5,
                        "data": {"en": {"feeds": [
                            {"name": "station_information", "url": INFORMATION}
                        ]}}
                    }),
                )
                .with_json(
                    INFORMATION,
                    &json!({
                        "last_updated": 1697040000, "ttl": 5,
                        "data": {"stations": [
                            {"station_id": "66db6387", "name": "W 21 St & 6 Ave", "lat": 40.74, "lon": -73.99, "capacity": 53}
                        ]}
                    }),
                ),
        )
    }

    fn client(dir: &Path, fetcher: Arc<MockFetcher>) -> Result<Citibike, CitibikeError> {
        Citibike::builder()
            .data_folder(dir.to_path_buf())
            .gbfs_url(DISCOVERY.to_string())
            .trip_data_url("https://bucket.test".to_string())
            .fetcher(fetcher)
            .build()
    }

    #[test]
    fn test_builder_creates_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let client = client(dir.path(), fetcher())?;
        assert!(client.trip_data_dir().is_dir());
        assert!(client.snapshots_dir().is_dir());
        assert!(client.snapshots()?.is_empty());
        assert_eq!(client.latest_snapshot()?, None);
        Ok(())
    }

    #[test]
    fn test_trip_data_uses_configured_endpoints() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let fetcher = fetcher();
        let client = Citibike::builder()
            .data_folder(dir.path().to_path_buf())
            .trip_data_url("https://bucket.test".to_string())
            .archive_name_variants(vec!["{month}.zip".to_string()])
            .fetcher(fetcher.clone())
            .build()?;

        let mut trips = client.trip_data(YearMonth::new(2023, 1)?).call();
        assert_eq!(
            trips.file_path(),
            dir.path().join("trip_data/202301-citibike-tripdata.csv")
        );
        assert!(trips.data().is_err());
        assert_eq!(fetcher.requests(), vec!["https://bucket.test/202301.zip"]);
        Ok(())
    }

    #[test]
    fn test_saved_snapshot_is_listed_and_readable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let client = client(dir.path(), fetcher())?;

        let mut registry = client.realtime().call();
        let id = registry.save()?;
        assert_eq!(client.snapshots()?, vec![id.clone()]);
        assert_eq!(client.latest_snapshot()?, Some(id.clone()));

        // Served from disk, not from the fetcher.
        let offline = Citibike::builder()
            .data_folder(dir.path().to_path_buf())
            .gbfs_url(DISCOVERY.to_string())
            .fetcher(Arc::new(MockFetcher::new()))
            .build()?;
        let mut datasets = offline.realtime().snapshot(id).call().datasets();
        let stations = datasets.station_information.stations()?;
        assert_eq!(stations[0].station_id, "66db6387");
        Ok(())
    }

    #[test]
    fn test_unknown_snapshot_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let client = client(dir.path(), fetcher())?;
        let mut registry = client
            .realtime()
            .snapshot(SnapshotId::from_secs(1.0))
            .call();
        assert!(matches!(
            registry.snapshot_path(),
            Err(RealtimeError::SnapshotNotFound(..))
        ));
        Ok(())
    }

    #[test]
    fn test_station_joins_through_client() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let client = client(dir.path(), fetcher())?;
        std::fs::write(
            client.trip_data_dir().join("202301-citibike-tripdata.csv"),
            "ride_id,started_at,ended_at,start_station_name,end_station_name,start_lat,start_lng
A1,2023-01-01 00:00:30,2023-01-01 00:05:00,W 21 St & 6 Ave,Broadway & E 14 St,40.74,-73.99
",
        )?;

        let mut trips = client.trip_data(YearMonth::new(2023, 1)?).call();
        let station = trips.find_station("W 21 St & 6 Ave")?.ok_or("missing station")?;
        assert_eq!(station.info()?.map(|i| i.capacity), Some(Some(53)));
        assert_eq!(station.id(), Some("66db6387"));
        Ok(())
    }
}
