use crate::fetch::error::FetchError;
use crate::realtime::error::RealtimeError;
use crate::trip_data::error::TripDataError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CitibikeError {
    #[error(transparent)]
    TripData(#[from] TripDataError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),

    #[error("Invalid year-month '{0}', expected YYYYMM or YYYY-MM with a month in 1..=12")]
    InvalidYearMonth(String),

    #[error("Invalid bucket width '{0}'")]
    InvalidBucketWidth(String),

    #[error("Invalid decay {0}")]
    InvalidDecay(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
