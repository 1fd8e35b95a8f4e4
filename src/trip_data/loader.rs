use crate::fetch::client::Fetch;
use crate::trip_data::error::TripDataError;
use crate::types::year_month::YearMonth;
use log::{info, warn};
use polars::prelude::*;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use ::zip::ZipArchive;

pub const DEFAULT_TRIP_DATA_URL: &str = "https://s3.amazonaws.com/tripdata";

/// Archive file names tried, in order, for a month. `{month}` becomes `YYYYMM`.
///
/// The second and third entries are misspellings the bucket actually uses for some months.
pub const DEFAULT_ARCHIVE_NAME_VARIANTS: [&str; 3] = [
    "{month}-citibike-tripdata.csv.zip",
    "{month}-citbike-tripdata.csv.zip",
    "{month}-citbike-tripdata.zip",
];

pub(crate) const STARTED_AT: &str = "started_at";
pub(crate) const ENDED_AT: &str = "ended_at";
pub(crate) const START_STATION_NAME: &str = "start_station_name";
pub(crate) const END_STATION_NAME: &str = "end_station_name";
pub(crate) const START_LAT: &str = "start_lat";
pub(crate) const START_LNG: &str = "start_lng";

const TIMESTAMP_COLUMNS: [&str; 2] = [STARTED_AT, ENDED_AT];

/// Timestamp layouts seen across the archives, tried in order. Since 2021 the archives
/// use ISO dates; 2013-2020 files use ISO dates with up to four fractional digits, and a
/// few 2014-2016 months use `M/D/YYYY`, with or without seconds.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const COORDINATE_COLUMNS: [&str; 4] = [START_LAT, START_LNG, "end_lat", "end_lng"];

/// Column names of the archives published before February 2021, mapped to the current
/// names.
const LEGACY_COLUMN_NAMES: [(&str, &str); 10] = [
    ("starttime", STARTED_AT),
    ("stoptime", ENDED_AT),
    ("start station id", "start_station_id"),
    ("start station name", START_STATION_NAME),
    ("start station latitude", START_LAT),
    ("start station longitude", START_LNG),
    ("end station id", "end_station_id"),
    ("end station name", END_STATION_NAME),
    ("end station latitude", "end_lat"),
    ("end station longitude", "end_lng"),
];

/// Downloads, caches and parses the monthly trip archives.
#[derive(Clone)]
pub struct TripDataLoader {
    data_dir: PathBuf,
    base_url: String,
    archive_name_variants: Vec<String>,
    fetcher: Arc<dyn Fetch>,
}

impl TripDataLoader {
    pub fn new(data_dir: &Path, fetcher: Arc<dyn Fetch>) -> TripDataLoader {
        TripDataLoader {
            data_dir: data_dir.to_path_buf(),
            base_url: DEFAULT_TRIP_DATA_URL.to_string(),
            archive_name_variants: DEFAULT_ARCHIVE_NAME_VARIANTS
                .iter()
                .map(|v| v.to_string())
                .collect(),
            fetcher,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the ordered list of archive file name templates (see
    /// [`DEFAULT_ARCHIVE_NAME_VARIANTS`]).
    pub fn with_archive_name_variants(mut self, variants: Vec<String>) -> Self {
        self.archive_name_variants = variants;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `YYYYMM-citibike-tripdata.csv`
    pub fn file_name(month: YearMonth) -> String {
        format!("{}-citibike-tripdata.csv", month)
    }

    pub fn cache_path(&self, month: YearMonth) -> PathBuf {
        self.data_dir.join(Self::file_name(month))
    }

    /// Archive URLs for `month`, in the order they are tried.
    pub fn archive_urls(&self, month: YearMonth) -> Vec<String> {
        let month = month.to_string();
        self.archive_name_variants
            .iter()
            .map(|variant| {
                format!(
                    "{}/{}",
                    self.base_url.trim_end_matches('/'),
                    variant.replace("{month}", &month)
                )
            })
            .collect()
    }

    /// Loads the trips of `month` from the local cache. On a cache miss the archive is
    /// downloaded and cached when `download` is set; otherwise
    /// [`TripDataError::CacheMissing`] is returned.
    pub fn get_data(&self, month: YearMonth, download: bool) -> Result<DataFrame, TripDataError> {
        let path = self.cache_path(month);
        if path.is_file() {
            info!("Cache hit for trip data {} at {:?}", month, path);
            return read_trip_csv(&path, month);
        }
        if !download {
            return Err(TripDataError::CacheMissing(path));
        }
        warn!("Cache miss for trip data {}. Downloading.", month);
        self.download(month, true)
    }

    /// Downloads the archive of `month` and parses it. With `save` the CSV is kept in the
    /// cache directory, otherwise it is discarded after parsing.
    pub fn download(&self, month: YearMonth, save: bool) -> Result<DataFrame, TripDataError> {
        let csv = self.fetch_archive(month)?;

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| TripDataError::DataDirCreation(self.data_dir.clone(), e))?;
        let mut temp_file = NamedTempFile::new_in(&self.data_dir)
            .map_err(|e| TripDataError::CacheWrite(self.data_dir.clone(), e))?;
        temp_file
            .write_all(&csv)
            .and_then(|_| temp_file.flush())
            .map_err(|e| TripDataError::CacheWrite(temp_file.path().to_path_buf(), e))?;

        let df = if save {
            let path = self.cache_path(month);
            temp_file
                .persist(&path)
                .map_err(|e| TripDataError::CachePersist(path.clone(), e))?;
            info!("Cached trip data for {} to {:?}", month, path);
            read_trip_csv(&path, month)?
        } else {
            read_trip_csv(temp_file.path(), month)?
        };
        info!("Finished loading {} trips for {}.", df.height(), month);
        Ok(df)
    }

    /// Tries every archive URL in order and returns the CSV of the first that works.
    /// The last failure is returned when none does.
    fn fetch_archive(&self, month: YearMonth) -> Result<Vec<u8>, TripDataError> {
        let mut last_error = None;
        for url in self.archive_urls(month) {
            match self.fetch_csv(&url) {
                Ok(csv) => return Ok(csv),
                Err(e) => {
                    warn!("Could not retrieve trip archive {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TripDataError::NoArchiveVariants(month.to_string())))
    }

    fn fetch_csv(&self, url: &str) -> Result<Vec<u8>, TripDataError> {
        let bytes = self.fetcher.get_bytes(url)?;
        extract_csv(url, bytes)
    }
}

/// Concatenates every CSV entry of a ZIP archive, in name order, keeping only the first
/// entry's header line. Directories and `__MACOSX/` resource forks are skipped.
fn extract_csv(url: &str, bytes: Vec<u8>) -> Result<Vec<u8>, TripDataError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| TripDataError::ArchiveOpen {
            url: url.to_string(),
            source: e,
        })?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| is_csv_entry(name))
        .map(str::to_owned)
        .collect();
    names.sort();
    if names.is_empty() {
        return Err(TripDataError::ArchiveEmpty(url.to_string()));
    }

    let mut csv = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let mut entry = archive
            .by_name(name)
            .map_err(|e| TripDataError::ArchiveOpen {
                url: url.to_string(),
                source: e,
            })?;
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| TripDataError::ArchiveEntryRead {
                url: url.to_string(),
                entry: name.clone(),
                source: e,
            })?;

        let body = if i == 0 {
            &contents[..]
        } else {
            without_header(&contents)
        };
        if !csv.is_empty() && !csv.ends_with(b"\n") {
            csv.push(b'\n');
        }
        csv.extend_from_slice(body);
    }
    Ok(csv)
}

fn is_csv_entry(name: &str) -> bool {
    !name.ends_with('/')
        && !name.starts_with("__MACOSX/")
        && name.to_ascii_lowercase().ends_with(".csv")
}

fn without_header(contents: &[u8]) -> &[u8] {
    match contents.iter().position(|&b| b == b'\n') {
        Some(i) => &contents[i + 1..],
        None => &[],
    }
}

/// Reads a trip CSV with every column as text, then renames legacy columns, parses the
/// trip timestamps to millisecond datetimes and the coordinates to floats. Values that do
/// not parse become null.
pub(crate) fn read_trip_csv(path: &Path, month: YearMonth) -> Result<DataFrame, TripDataError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| TripDataError::CsvRead(path.to_path_buf(), e))?
        .finish()
        .map_err(|e| TripDataError::CsvRead(path.to_path_buf(), e))?;

    let exprs: Vec<Expr> = df
        .get_column_names()
        .iter()
        .map(|name| {
            let source = name.as_str();
            let target = LEGACY_COLUMN_NAMES
                .iter()
                .find(|(legacy, _)| *legacy == source)
                .map_or(source, |(_, current)| *current);
            let expr = if TIMESTAMP_COLUMNS.contains(&target) {
                parse_timestamp(source)
            } else if COORDINATE_COLUMNS.contains(&target) {
                col(source).cast(DataType::Float64)
            } else {
                col(source)
            };
            expr.alias(target)
        })
        .collect();

    let df = df.lazy().select(exprs).collect()?;
    for required in TIMESTAMP_COLUMNS {
        if df.column(required).is_err() {
            return Err(TripDataError::MissingColumn {
                month: month.to_string(),
                column: required.to_string(),
            });
        }
    }
    Ok(df)
}

/// The first of [`TIMESTAMP_FORMATS`] that matches each value; null when none does.
fn parse_timestamp(column: &str) -> Expr {
    let attempts: Vec<Expr> = TIMESTAMP_FORMATS
        .iter()
        .map(|format| {
            col(column).str().to_datetime(
                Some(TimeUnit::Milliseconds),
                None,
                StrptimeOptions {
                    format: Some((*format).into()),
                    strict: false,
                    exact: true,
                    ..Default::default()
                },
                lit("raise"),
            )
        })
        .collect();
    coalesce(&attempts)
}
