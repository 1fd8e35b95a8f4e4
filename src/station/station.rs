use crate::error::CitibikeError;
use crate::realtime::feeds::{StationInformation, StationStatus};
use crate::realtime::source::FeedSource;
use crate::station::bucketing::{self, ARRIVALS, DEPARTURES};
use crate::trip_data::loader::{END_STATION_NAME, START_LAT, START_LNG, START_STATION_NAME};
use crate::types::bucket_width::BucketWidth;
use crate::types::decay::Decay;
use crate::types::gbfs::{StationInformationRecord, StationStatusRecord};
use crate::types::time_range::TimeRange;
use crate::types::year_month::YearMonth;
use bon::bon;
use log::warn;
use polars::prelude::*;

/// One station of a month of trip data, identified by its name in the trip records.
///
/// Trip views and real-time records are computed on first access and kept for the
/// lifetime of the value.
///
/// Obtained through [`TripData::stations`](crate::TripData::stations) or
/// [`TripData::find_station`](crate::TripData::find_station).
#[derive(Debug, Clone)]
pub struct Station {
    name: String,
    month: YearMonth,
    trips: DataFrame,
    source: FeedSource,
    id: Option<String>,
    departures: Option<DataFrame>,
    arrivals: Option<DataFrame>,
    info: Option<StationInformationRecord>,
    status: Option<StationStatusRecord>,
}

#[bon]
impl Station {
    pub(crate) fn new(
        name: impl Into<String>,
        month: YearMonth,
        trips: DataFrame,
        source: FeedSource,
    ) -> Self {
        Self {
            name: name.into(),
            month,
            trips,
            source,
            id: None,
            departures: None,
            arrivals: None,
            info: None,
            status: None,
        }
    }

    /// The station name as written in the trip records.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The month of trips this station was taken from.
    pub fn month(&self) -> YearMonth {
        self.month
    }

    /// The real-time station id, known once [`Self::info`] matched a record.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Trips that started at this station.
    pub fn departures(&mut self) -> Result<&DataFrame, CitibikeError> {
        let df = match self.departures.take() {
            Some(df) => df,
            None => self.trips_where(START_STATION_NAME)?,
        };
        Ok(self.departures.insert(df))
    }

    /// Trips that ended at this station.
    pub fn arrivals(&mut self) -> Result<&DataFrame, CitibikeError> {
        let df = match self.arrivals.take() {
            Some(df) => df,
            None => self.trips_where(END_STATION_NAME)?,
        };
        Ok(self.arrivals.insert(df))
    }

    fn trips_where(&self, name_column: &str) -> PolarsResult<DataFrame> {
        self.trips
            .clone()
            .lazy()
            .filter(col(name_column).eq(lit(self.name.as_str())))
            .collect()
    }

    /// `(latitude, longitude)` recorded on the first departure, `None` without departures.
    pub fn coordinates(&mut self) -> Result<Option<(f64, f64)>, CitibikeError> {
        let departures = self.departures()?;
        if departures.height() == 0 {
            return Ok(None);
        }
        let lat = departures.column(START_LAT)?.f64()?.get(0);
        let lng = departures.column(START_LNG)?.f64()?.get(0);
        Ok(lat.zip(lng))
    }

    /// The `station_information` record with this station's name. Sets [`Self::id`] on a
    /// match.
    ///
    /// Names are compared exactly first, then in normalized form. A station missing from
    /// the feed is logged and gives `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`CitibikeError::Realtime`] when the feed cannot be fetched, read from its snapshot
    /// or parsed.
    pub fn info(&mut self) -> Result<Option<&StationInformationRecord>, CitibikeError> {
        if self.info.is_none() {
            let mut information = StationInformation::new(self.source.clone());
            match information.find_by_name(&self.name)? {
                Some(record) => {
                    self.id = Some(record.station_id.clone());
                    self.info = Some(record.clone());
                }
                None => warn!(
                    "Station '{}' is not listed in station_information",
                    self.name
                ),
            }
        }
        Ok(self.info.as_ref())
    }

    /// The `station_status` record for this station, matched by id. The id is resolved
    /// through [`Self::info`] first if it is not known yet.
    pub fn status(&mut self) -> Result<Option<&StationStatusRecord>, CitibikeError> {
        if self.status.is_none() {
            if self.id.is_none() {
                self.info()?;
            }
            let Some(id) = self.id.clone() else {
                warn!("No station id known for '{}'", self.name);
                return Ok(None);
            };
            let mut status = StationStatus::new(self.source.clone());
            match status.find_by_id(&id)? {
                Some(record) => self.status = Some(record.clone()),
                None => warn!(
                    "Station '{}' ({}) is not listed in station_status",
                    self.name, id
                ),
            }
        }
        Ok(self.status.as_ref())
    }

    /// Departures and arrivals per bucket of the month. Columns `bucket`, `departures`
    /// and `arrivals`; every bucket is present and counts are never null.
    ///
    /// Departures are bucketed by `started_at`, arrivals by `ended_at`. Trips starting or
    /// ending outside the month are not counted on that side.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use citibike::{BucketWidth, Citibike, CitibikeError, YearMonth};
    /// # fn main() -> Result<(), CitibikeError> {
    /// let client = Citibike::new()?;
    /// let mut trips = client.trip_data(YearMonth::new(2023, 1)?).call();
    /// if let Some(station) = trips.find_station("W 21 St & 6 Ave")? {
    ///     let hourly = station.trip_counts(BucketWidth::hours(1)?)?;
    ///     println!("{}", hourly);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn trip_counts(&mut self, width: BucketWidth) -> Result<DataFrame, CitibikeError> {
        let departures = self.departures()?.clone();
        let arrivals = self.arrivals()?.clone();
        let range = TimeRange::new(self.month.start(), self.month.end(), width);
        Ok(bucketing::trip_counts(&departures, &arrivals, &range)?)
    }

    /// Estimated bike availability: exponentially weighted mean of arrivals per bucket.
    ///
    /// # Arguments (Builder Methods)
    ///
    /// * `.decay(Decay)`: **Required.** How fast older buckets lose weight.
    /// * `.width(BucketWidth)`: bucket width, default one minute.
    /// * `.adjust(bool)`: divide by the decaying weight sum (default `true`).
    /// * `.min_periods(usize)`: buckets needed before a value is produced (default 1).
    ///
    /// # Returns
    ///
    /// A frame with `bucket` and `estimate` (`Float64`), one row per bucket of the month.
    ///
    /// # Errors
    ///
    /// [`CitibikeError::InvalidDecay`] for an out-of-range decay parameter.
    #[builder]
    pub fn est_bike_availability(
        &mut self,
        decay: Decay,
        width: Option<BucketWidth>,
        adjust: Option<bool>,
        min_periods: Option<usize>,
    ) -> Result<DataFrame, CitibikeError> {
        self.estimate(ARRIVALS, decay, width, adjust, min_periods)
    }

    /// Estimated dock availability: exponentially weighted mean of departures per bucket.
    /// Options as for [`Self::est_bike_availability`].
    #[builder]
    pub fn est_dock_availability(
        &mut self,
        decay: Decay,
        width: Option<BucketWidth>,
        adjust: Option<bool>,
        min_periods: Option<usize>,
    ) -> Result<DataFrame, CitibikeError> {
        self.estimate(DEPARTURES, decay, width, adjust, min_periods)
    }

    fn estimate(
        &mut self,
        column: &str,
        decay: Decay,
        width: Option<BucketWidth>,
        adjust: Option<bool>,
        min_periods: Option<usize>,
    ) -> Result<DataFrame, CitibikeError> {
        let alpha = decay.alpha()?;
        let counts = self.trip_counts(width.unwrap_or_default())?;
        Ok(bucketing::smoothed(
            &counts,
            column,
            alpha,
            adjust.unwrap_or(true),
            min_periods.unwrap_or(1),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::station::bucketing::{BUCKET, ESTIMATE};
    use crate::trip_data::loader::read_trip_csv;
    use serde_json::json;
    use std::sync::Arc;

    const DISCOVERY: &str = "https://gbfs.test/gbfs.json";
    const INFORMATION: &str = "https://gbfs.test/station_information.json";
    const STATUS: &str = "https://gbfs.test/station_status.json";

    const CSV: &str = "ride_id,started_at,ended_at,start_station_name,end_station_name,start_lat,start_lng,end_lat,end_lng
A1,2023-01-01 00:00:30,2023-01-01 00:05:00,W 21 St & 6 Ave,Broadway & E 14 St,40.7417,-73.9941,40.7345,-73.9907
A2,2023-01-01 00:01:10,2023-01-01 00:09:00,W 21 St & 6 Ave,Broadway & E 14 St,40.7418,-73.9942,40.7345,-73.9907
A3,2023-01-01 00:02:00,2023-01-01 00:04:20,Broadway & E 14 St,W 21 St & 6 Ave,40.7345,-73.9907,40.7417,-73.9941
A4,2022-12-31 23:58:00,2023-01-01 00:03:00,Broadway & E 14 St,W 21 St & 6 Ave,40.7345,-73.9907,40.7417,-73.9941
A5,2023-01-31 23:50:00,2023-02-01 00:10:00,W 21 St & 6 Ave,Broadway & E 14 St,40.7417,-73.9941,40.7345,-73.9907
";

    fn source() -> FeedSource {
        let fetcher = MockFetcher::new()
            .with_json(
                DISCOVERY,
                &json!({
                    "last_updated": 1697040000, "ttl": 5,
                    "data": {"en": {"feeds": [
                        {"name": "station_information", "url": INFORMATION},
                        {"name": "station_status", "url": STATUS}
                    ]}}
                }),
            )
            .with_json(
                INFORMATION,
                &json!({
                    "last_updated": 1697040000, "ttl": 5,
                    "data": {"stations": [
                        {"station_id": "66db6387", "name": "W 21 St  & 6 Ave", "lat": 40.7417, "lon": -73.9941, "capacity": 53},
                        {"station_id": "66dc0e99", "name": "Broadway & E 14 St", "lat": 40.7345, "lon": -73.9907, "capacity": 47}
                    ]}
                }),
            )
            .with_json(
                STATUS,
                &json!({
                    "last_updated": 1697040000, "ttl": 5,
                    "data": {"stations": [
                        {"station_id": "66dc0e99", "num_bikes_available": 3, "num_docks_available": 44, "is_renting": 1},
                        {"station_id": "66db6387", "num_bikes_available": 12, "num_docks_available": 41, "is_renting": true}
                    ]}
                }),
            );
        FeedSource::new(DISCOVERY, "/nonexistent/snapshots", Arc::new(fetcher))
    }

    fn station(name: &str) -> Result<Station, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trips.csv");
        std::fs::write(&path, CSV)?;
        let month = YearMonth::new(2023, 1)?;
        let trips = read_trip_csv(&path, month)?;
        Ok(Station::new(name, month, trips, source()))
    }

    #[test]
    fn test_departures_and_arrivals() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("W 21 St & 6 Ave")?;
        assert_eq!(station.departures()?.height(), 3);
        assert_eq!(station.arrivals()?.height(), 2);
        assert_eq!(station.coordinates()?, Some((40.7417, -73.9941)));
        Ok(())
    }

    #[test]
    fn test_unknown_station_has_no_trips() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("Nowhere")?;
        assert_eq!(station.departures()?.height(), 0);
        assert_eq!(station.coordinates()?, None);
        Ok(())
    }

    #[test]
    fn test_counts_sum_to_in_month_trips() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("W 21 St & 6 Ave")?;
        let counts = station.trip_counts(BucketWidth::minutes(1)?)?;
        let departures: u32 = counts.column(DEPARTURES)?.u32()?.iter().flatten().sum();
        let arrivals: u32 = counts.column(ARRIVALS)?.u32()?.iter().flatten().sum();
        // A5 departs inside the month; A4 arrives inside the month.
        assert_eq!(departures, 3);
        assert_eq!(arrivals, 2);

        let mut other = station_named_broadway()?;
        let counts = other.trip_counts(BucketWidth::minutes(1)?)?;
        let departures: u32 = counts.column(DEPARTURES)?.u32()?.iter().flatten().sum();
        let arrivals: u32 = counts.column(ARRIVALS)?.u32()?.iter().flatten().sum();
        // A4 departs in December; A5 arrives in February.
        assert_eq!(departures, 1);
        assert_eq!(arrivals, 2);
        Ok(())
    }

    fn station_named_broadway() -> Result<Station, Box<dyn std::error::Error>> {
        station("Broadway & E 14 St")
    }

    #[test]
    fn test_name_and_id_joins_agree() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("W 21 St & 6 Ave")?;
        // Status first: the id has to be resolved through the name join.
        let status = station.status()?.cloned();
        let info = station.info()?.cloned();

        let info = info.ok_or("no info")?;
        let status = status.ok_or("no status")?;
        assert_eq!(info.station_id, "66db6387");
        assert_eq!(status.station_id, info.station_id);
        assert_eq!(station.id(), Some("66db6387"));
        assert_eq!(status.num_bikes_available, 12);
        Ok(())
    }

    #[test]
    fn test_missing_name_yields_none() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("Nowhere")?;
        assert!(station.info()?.is_none());
        assert!(station.status()?.is_none());
        assert_eq!(station.id(), None);
        Ok(())
    }

    #[test]
    fn test_availability_estimates() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("W 21 St & 6 Ave")?;
        let bikes = station
            .est_bike_availability()
            .decay(Decay::Alpha(0.5))
            .width(BucketWidth::hours(1)?)
            .call()?;
        assert_eq!(bikes.height(), 31 * 24);
        assert_eq!(bikes.width(), 2);
        assert!(bikes.column(BUCKET).is_ok());
        // Both arrivals fall in the first hour.
        assert_eq!(bikes.column(ESTIMATE)?.f64()?.get(0), Some(2.0));

        let docks = station
            .est_dock_availability()
            .decay(Decay::Com(1.0))
            .adjust(false)
            .call()?;
        assert_eq!(docks.height(), 31 * 24 * 60);
        assert_eq!(docks.column(ESTIMATE)?.f64()?.get(0), Some(1.0));
        Ok(())
    }

    #[test]
    fn test_invalid_decay_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut station = station("W 21 St & 6 Ave")?;
        let result = station
            .est_bike_availability()
            .decay(Decay::Alpha(1.5))
            .call();
        assert!(matches!(result, Err(CitibikeError::InvalidDecay(_))));
        Ok(())
    }
}
