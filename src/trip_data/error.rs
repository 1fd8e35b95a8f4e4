use crate::fetch::error::FetchError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TripDataError {
    #[error("Failed to create trip data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("No cached trip data at '{0}' and downloading is disabled")]
    CacheMissing(PathBuf),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No archive name variants configured for {0}")]
    NoArchiveVariants(String),

    #[error("Failed to open ZIP archive from {url}")]
    ArchiveOpen {
        url: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("ZIP archive from {0} contains no CSV file")]
    ArchiveEmpty(String),

    #[error("Failed to read entry '{entry}' of ZIP archive from {url}")]
    ArchiveEntryRead {
        url: String,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error writing trip data cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to move downloaded trip data into '{0}'")]
    CachePersist(PathBuf, #[source] tempfile::PersistError),

    #[error("Parsing error reading trip data CSV '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Trip data for {month} has no '{column}' column")]
    MissingColumn { month: String, column: String },

    #[error("Failed processing trip DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
