use crate::types::bucket_width::BucketWidth;
use chrono::{DateTime, NaiveDateTime};

/// A half-open interval `[start, end)` cut into buckets of a fixed width.
///
/// Buckets are labelled by their left edge. The last bucket starts strictly before `end`
/// and may extend past it when the width does not divide the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
    width: BucketWidth,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, width: BucketWidth) -> Self {
        Self { start, end, width }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn width(&self) -> BucketWidth {
        self.width
    }

    pub(crate) fn start_millis(&self) -> i64 {
        self.start.and_utc().timestamp_millis()
    }

    pub(crate) fn end_millis(&self) -> i64 {
        self.end.and_utc().timestamp_millis()
    }

    /// Number of buckets in the range.
    pub fn len(&self) -> usize {
        let span = self.end_millis() - self.start_millis();
        if span <= 0 {
            return 0;
        }
        let width = self.width.as_millis();
        ((span - 1) / width + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Left edges of every bucket as milliseconds since the UNIX epoch.
    pub(crate) fn bucket_millis(&self) -> impl Iterator<Item = i64> {
        let start = self.start_millis();
        let width = self.width.as_millis();
        (0..self.len() as i64).map(move |i| start + i * width)
    }

    /// Left edges of every bucket.
    pub fn buckets(&self) -> impl Iterator<Item = NaiveDateTime> {
        self.bucket_millis()
            .filter_map(|ms| DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc()))
    }
}
