//! Width of the time buckets trip events are counted in.

use crate::error::CitibikeError;
use chrono::Duration;
use std::fmt;
use std::str::FromStr;

/// A positive, fixed bucket width. Defaults to one minute.
///
/// Can be parsed from the short frequency aliases commonly used for resampling:
/// `"30s"`, `"1min"` (or `"1T"`), `"2h"` (or `"2H"`), `"1d"`.
///
/// # Examples
///
/// ```
/// use citibike::BucketWidth;
///
/// let width: BucketWidth = "15min".parse().unwrap();
/// assert_eq!(width, BucketWidth::minutes(15).unwrap());
/// assert_eq!(BucketWidth::default().to_string(), "1min");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketWidth(Duration);

impl BucketWidth {
    pub fn new(duration: Duration) -> Result<Self, CitibikeError> {
        if duration.num_milliseconds() <= 0 {
            return Err(CitibikeError::InvalidBucketWidth(format!(
                "{}ms",
                duration.num_milliseconds()
            )));
        }
        Ok(Self(duration))
    }

    pub fn milliseconds(n: i64) -> Result<Self, CitibikeError> {
        Self::checked(Duration::try_milliseconds(n), n, "ms")
    }

    pub fn seconds(n: i64) -> Result<Self, CitibikeError> {
        Self::checked(Duration::try_seconds(n), n, "s")
    }

    pub fn minutes(n: i64) -> Result<Self, CitibikeError> {
        Self::checked(Duration::try_minutes(n), n, "min")
    }

    pub fn hours(n: i64) -> Result<Self, CitibikeError> {
        Self::checked(Duration::try_hours(n), n, "h")
    }

    pub fn days(n: i64) -> Result<Self, CitibikeError> {
        Self::checked(Duration::try_days(n), n, "d")
    }

    /// `None` means `n` units do not fit in a `Duration`.
    fn checked(duration: Option<Duration>, n: i64, unit: &str) -> Result<Self, CitibikeError> {
        let duration =
            duration.ok_or_else(|| CitibikeError::InvalidBucketWidth(format!("{}{}", n, unit)))?;
        Self::new(duration)
    }

    pub fn duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> i64 {
        self.0.num_milliseconds()
    }
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self(Duration::minutes(1))
    }
}

impl From<BucketWidth> for Duration {
    fn from(width: BucketWidth) -> Self {
        width.0
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.num_seconds();
        let sub_second = self.0.num_milliseconds() % 1000 != 0;
        if sub_second {
            write!(f, "{}ms", self.0.num_milliseconds())
        } else if secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            write!(f, "{}min", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl FromStr for BucketWidth {
    type Err = CitibikeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CitibikeError::InvalidBucketWidth(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        // A bare unit means one of it, as in "min" or "h".
        let n: i64 = if number.is_empty() {
            1
        } else {
            number.parse().map_err(|_| invalid())?
        };
        let width = match unit {
            "ms" => BucketWidth::milliseconds(n),
            "s" | "S" => BucketWidth::seconds(n),
            "min" | "T" | "m" => BucketWidth::minutes(n),
            "h" | "H" => BucketWidth::hours(n),
            "d" | "D" => BucketWidth::days(n),
            _ => return Err(invalid()),
        };
        width.map_err(|_| invalid())
    }
}
