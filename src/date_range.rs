//! Inclusive calendar date ranges for months and years.

use serde::Serialize;
use time::{Date, Month, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

/// The ISO 8601 calendar date format used in query parameters, e.g. "2024-03-05".
const ISO_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A range of dates where both `start` and `end` are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// The first day in the range.
    pub start: Date,
    /// The last day in the range.
    pub end: Date,
}

impl DateRange {
    /// Create a date range.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if `end` is before `start`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if end < start {
            return Err(Error::Validation(format!(
                "the end date {end} is before the start date {start}"
            )));
        }

        Ok(Self { start, end })
    }

    /// The first through the last day of `month` in `year`.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if `month` is not in 1..=12 or the year
    /// is out of range.
    pub fn month(month: u8, year: i32) -> Result<Self, Error> {
        let month = Month::try_from(month)
            .map_err(|_| Error::Validation(format!("{month} is not a valid month")))?;
        let start = Date::from_calendar_date(year, month, 1)
            .map_err(|_| Error::Validation(format!("{year} is not a valid year")))?;
        let end = start
            .replace_day(month.length(year))
            .map_err(|_| Error::Validation(format!("{year} is not a valid year")))?;

        Ok(Self { start, end })
    }

    /// January 1st through December 31st of `year`.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if the year is out of range.
    pub fn year(year: i32) -> Result<Self, Error> {
        let start = Date::from_calendar_date(year, Month::January, 1)
            .map_err(|_| Error::Validation(format!("{year} is not a valid year")))?;
        let end = Date::from_calendar_date(year, Month::December, 31)
            .map_err(|_| Error::Validation(format!("{year} is not a valid year")))?;

        Ok(Self { start, end })
    }

    /// Whether `date` falls within the range, inclusive of both ends.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Parse an ISO 8601 calendar date such as "2024-03-05".
///
/// # Errors
/// Returns an [Error::Validation] naming `field` if the date is malformed.
pub fn parse_iso_date(field: &str, value: &str) -> Result<Date, Error> {
    Date::parse(value, ISO_DATE_FORMAT).map_err(|_| {
        Error::Validation(format!(
            "{field} \"{value}\" is not a date in the format YYYY-MM-DD"
        ))
    })
}
