mod citibike;
mod error;
mod fetch;
mod realtime;
mod station;
mod trip_data;
mod types;
mod utils;

pub use citibike::*;
pub use error::CitibikeError;

pub use fetch::client::{Fetch, HttpFetcher};
pub use fetch::error::FetchError;
pub use fetch::mock::MockFetcher;

pub use realtime::error::RealtimeError;
pub use realtime::feeds::{
    normalize_station_name, FeedSnapshot, GbfsFeed, StationInformation,
    StationInformationFeed, StationStatus, StationStatusFeed, SystemInformation,
    SystemInformationFeed,
};
pub use realtime::registry::{Datasets, FeedRegistry};
pub use realtime::snapshot::{latest_snapshot, list_snapshots, snapshot_dir, SnapshotId};
pub use realtime::source::{FeedSource, DEFAULT_LANGUAGE};

pub use station::bucketing::{ARRIVALS, BUCKET, DEPARTURES, ESTIMATE};
pub use station::station::Station;

pub use trip_data::error::TripDataError;
pub use trip_data::loader::{TripDataLoader, DEFAULT_ARCHIVE_NAME_VARIANTS, DEFAULT_TRIP_DATA_URL};
pub use trip_data::trip_data::TripData;

pub use types::bucket_width::BucketWidth;
pub use types::decay::Decay;
pub use types::gbfs::*;
pub use types::time_range::TimeRange;
pub use types::year_month::YearMonth;
