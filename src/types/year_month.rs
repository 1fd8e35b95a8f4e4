//! Calendar month used to address a monthly trip archive.

use crate::error::CitibikeError;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month, e.g. January 2023.
///
/// Displays as `YYYYMM`, the form used by the trip archive file names
/// (`202301-citibike-tripdata.csv`). Parsing accepts both `YYYYMM` and `YYYY-MM`.
///
/// # Examples
///
/// ```
/// use citibike::YearMonth;
///
/// let month: YearMonth = "202301".parse().unwrap();
/// assert_eq!(month, YearMonth::new(2023, 1).unwrap());
/// assert_eq!(month.to_string(), "202301");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a `YearMonth`, failing with [`CitibikeError::InvalidYearMonth`] if
    /// `month` is not in `1..=12` or the year is out of chrono's range.
    pub fn new(year: i32, month: u32) -> Result<Self, CitibikeError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CitibikeError::InvalidYearMonth(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        // Validated in the constructor.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// The month after this one.
    pub fn succ(self) -> YearMonth {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight on the first day of the month (inclusive).
    pub fn start(self) -> NaiveDateTime {
        self.first_day().and_time(chrono::NaiveTime::MIN)
    }

    /// Midnight on the first day of the following month (exclusive).
    pub fn end(self) -> NaiveDateTime {
        self.succ().start()
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = CitibikeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CitibikeError::InvalidYearMonth(s.to_string());
        let digits: String = match s.len() {
            6 => s.to_string(),
            7 if s.as_bytes()[4] == b'-' => format!("{}{}", &s[..4], &s[5..]),
            _ => return Err(invalid()),
        };
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = digits[..4].parse().map_err(|_| invalid())?;
        let month: u32 = digits[4..].parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_forms() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!("202311".parse::<YearMonth>()?, YearMonth::new(2023, 11)?);
        assert_eq!("2023-11".parse::<YearMonth>()?, YearMonth::new(2023, 11)?);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["2023", "202313", "202300", "2023/11", "abcdef", "2023-1", "2023111"] {
            assert!(
                matches!(input.parse::<YearMonth>(), Err(CitibikeError::InvalidYearMonth(_))),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_period_spans_whole_month() -> Result<(), Box<dyn std::error::Error>> {
        let dec = YearMonth::new(2022, 12)?;
        assert_eq!(dec.start().to_string(), "2022-12-01 00:00:00");
        assert_eq!(dec.end().to_string(), "2023-01-01 00:00:00");

        let feb = YearMonth::new(2024, 2)?;
        assert_eq!((feb.end() - feb.start()).num_days(), 29);
        Ok(())
    }

    #[test]
    fn test_display_pads() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(YearMonth::new(2019, 3)?.to_string(), "201903");
        Ok(())
    }
}
