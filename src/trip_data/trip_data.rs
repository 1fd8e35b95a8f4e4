use crate::error::CitibikeError;
use crate::realtime::source::FeedSource;
use crate::station::station::Station;
use crate::trip_data::loader::{TripDataLoader, START_STATION_NAME};
use crate::types::bucket_width::BucketWidth;
use crate::types::time_range::TimeRange;
use crate::types::year_month::YearMonth;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;

/// The trips of one calendar month.
///
/// Nothing is read until the trips are first needed; [`Self::data`] then loads them from
/// the cache, downloading on a miss.
pub struct TripData {
    month: YearMonth,
    loader: TripDataLoader,
    source: FeedSource,
    data: Option<DataFrame>,
    station_names: Option<Vec<String>>,
    stations: Option<Vec<Station>>,
}

impl TripData {
    /// Creates the trip data of `month`. Nothing is read yet.
    ///
    /// Usually obtained through [`Citibike::trip_data`](crate::Citibike::trip_data), which
    /// wires in the client's loader and feed source.
    ///
    /// # Arguments
    ///
    /// * `month` - The calendar month of trips.
    /// * `loader` - Where the month's CSV is cached and downloaded from.
    /// * `source` - Real-time feeds the month's stations are joined against.
    pub fn new(month: YearMonth, loader: TripDataLoader, source: FeedSource) -> Self {
        Self {
            month,
            loader,
            source,
            data: None,
            station_names: None,
            stations: None,
        }
    }

    /// The calendar month these trips belong to.
    pub fn month(&self) -> YearMonth {
        self.month
    }

    /// Name of the cached CSV, `YYYYMM-citibike-tripdata.csv`.
    pub fn file_name(&self) -> String {
        TripDataLoader::file_name(self.month)
    }

    /// Full path of the cached CSV. The file may not exist yet.
    pub fn file_path(&self) -> PathBuf {
        self.loader.cache_path(self.month)
    }

    /// First instant of the month.
    pub fn start(&self) -> NaiveDateTime {
        self.month.start()
    }

    /// First instant of the following month.
    pub fn end(&self) -> NaiveDateTime {
        self.month.end()
    }

    /// The month cut into buckets of `width`.
    pub fn time_range(&self, width: BucketWidth) -> TimeRange {
        TimeRange::new(self.start(), self.end(), width)
    }

    /// The trips, loaded on first call (downloading if the month is not cached).
    ///
    /// # Errors
    ///
    /// [`CitibikeError::TripData`] when the archive cannot be downloaded or extracted, or
    /// the CSV cannot be read.
    pub fn data(&mut self) -> Result<&DataFrame, CitibikeError> {
        let df = match self.data.take() {
            Some(df) => df,
            None => self.loader.get_data(self.month, true)?,
        };
        Ok(self.data.insert(df))
    }

    /// Reloads the trips, downloading on a cache miss only if `download` is set.
    /// Derived station data is dropped.
    ///
    /// # Errors
    ///
    /// [`TripDataError::CacheMissing`](crate::TripDataError::CacheMissing) (wrapped in
    /// [`CitibikeError::TripData`]) when the month is not cached and `download` is false.
    pub fn load(&mut self, download: bool) -> Result<&DataFrame, CitibikeError> {
        let df = self.loader.get_data(self.month, download)?;
        Ok(self.replace_data(df))
    }

    /// Downloads the month's archive regardless of the cache, keeping the CSV when
    /// `save` is set. Derived station data is dropped.
    pub fn download(&mut self, save: bool) -> Result<&DataFrame, CitibikeError> {
        let df = self.loader.download(self.month, save)?;
        Ok(self.replace_data(df))
    }

    fn replace_data(&mut self, df: DataFrame) -> &DataFrame {
        self.station_names = None;
        self.stations = None;
        self.data.insert(df)
    }

    /// Distinct origin station names, in order of first appearance.
    pub fn station_names(&mut self) -> Result<&[String], CitibikeError> {
        let names = match self.station_names.take() {
            Some(names) => names,
            None => distinct_station_names(self.data()?)?,
        };
        Ok(self.station_names.insert(names))
    }

    /// One [`Station`] per name in [`Self::station_names`].
    pub fn stations(&mut self) -> Result<&mut [Station], CitibikeError> {
        let stations = match self.stations.take() {
            Some(stations) => stations,
            None => {
                let names = self.station_names()?.to_vec();
                let trips = self.data()?.clone();
                names
                    .into_iter()
                    .map(|name| Station::new(name, self.month, trips.clone(), self.source.clone()))
                    .collect()
            }
        };
        Ok(self.stations.insert(stations))
    }

    /// The first station named exactly `name`.
    pub fn find_station(&mut self, name: &str) -> Result<Option<&mut Station>, CitibikeError> {
        Ok(self.stations()?.iter_mut().find(|s| s.name() == name))
    }
}

fn distinct_station_names(df: &DataFrame) -> PolarsResult<Vec<String>> {
    let names = df.column(START_STATION_NAME)?.str()?;
    let mut seen = HashSet::new();
    Ok(names
        .into_iter()
        .flatten()
        .filter(|name| seen.insert(*name))
        .map(str::to_owned)
        .collect())
}
