//! Time-bucketed trip counts and their exponentially weighted smoothing.

use crate::trip_data::loader::{ENDED_AT, STARTED_AT};
use crate::types::time_range::TimeRange;
use polars::prelude::*;

pub const BUCKET: &str = "bucket";
pub const DEPARTURES: &str = "departures";
pub const ARRIVALS: &str = "arrivals";
pub const ESTIMATE: &str = "estimate";

const EVENT_MILLIS: &str = "event_ms";

fn datetime_ms() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Counts the rows of `trips` per bucket of `range`, keyed on the timestamp column
/// `timestamp`. Rows outside the range or with a null timestamp are dropped; buckets
/// without rows are absent. Buckets are left-labelled milliseconds since the epoch.
fn bucket_counts(trips: &DataFrame, timestamp: &str, range: &TimeRange, alias: &str) -> LazyFrame {
    let start = range.start_millis();
    let end = range.end_millis();
    let width = range.width().as_millis();

    trips
        .clone()
        .lazy()
        .select([col(timestamp)
            .cast(datetime_ms())
            .cast(DataType::Int64)
            .alias(EVENT_MILLIS)])
        .filter(
            col(EVENT_MILLIS)
                .gt_eq(lit(start))
                .and(col(EVENT_MILLIS).lt(lit(end))),
        )
        .select([
            (col(EVENT_MILLIS) - (col(EVENT_MILLIS) - lit(start)) % lit(width)).alias(BUCKET),
        ])
        .group_by([col(BUCKET)])
        .agg([len().alias(alias)])
}

/// Departures (by `started_at`) and arrivals (by `ended_at`) per bucket, reindexed so
/// every bucket of `range` appears once, ascending, with zero where nothing happened.
pub(crate) fn trip_counts(
    departures: &DataFrame,
    arrivals: &DataFrame,
    range: &TimeRange,
) -> PolarsResult<DataFrame> {
    let buckets: Vec<i64> = range.bucket_millis().collect();
    let index = df!(BUCKET => buckets)?;

    index
        .lazy()
        .left_join(
            bucket_counts(departures, STARTED_AT, range, DEPARTURES),
            col(BUCKET),
            col(BUCKET),
        )
        .left_join(
            bucket_counts(arrivals, ENDED_AT, range, ARRIVALS),
            col(BUCKET),
            col(BUCKET),
        )
        .select([
            col(BUCKET).cast(datetime_ms()),
            col(DEPARTURES).fill_null(lit(0)).cast(DataType::UInt32),
            col(ARRIVALS).fill_null(lit(0)).cast(DataType::UInt32),
        ])
        .sort([BUCKET], SortMultipleOptions::default())
        .collect()
}

/// Exponentially weighted mean of `column` in a [`trip_counts`] frame, as `estimate`
/// next to its bucket.
pub(crate) fn smoothed(
    counts: &DataFrame,
    column: &str,
    alpha: f64,
    adjust: bool,
    min_periods: usize,
) -> PolarsResult<DataFrame> {
    let mut options = EWMOptions::default();
    options.alpha = alpha;
    options.adjust = adjust;
    options.min_periods = min_periods;

    counts
        .clone()
        .lazy()
        .select([
            col(BUCKET),
            col(column)
                .cast(DataType::Float64)
                .ewm_mean(options)
                .alias(ESTIMATE),
        ])
        .collect()
}
