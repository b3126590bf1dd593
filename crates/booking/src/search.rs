//! The one-day window used by route search.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use common::Route;

use crate::error::BookingError;

/// Wire format of a search day.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` day into its UTC midnight.
///
/// Days whose search window would run past the end of the calendar are
/// rejected as `InvalidDate`.
pub fn parse_day(raw: &str) -> Result<DateTime<Utc>, BookingError> {
    let day = NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT)
        .map_err(|e| BookingError::InvalidDate(format!("{raw:?}: {e}")))?;
    Ok(SearchWindow::day_starting(day)?.from())
}

/// Half-open departure window `[from, from + 24h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl SearchWindow {
    /// Window starting at the given instant.
    pub fn starting_at(from: DateTime<Utc>) -> Result<Self, BookingError> {
        let until = from.checked_add_signed(Duration::hours(24)).ok_or_else(|| {
            BookingError::InvalidDate(format!("search window from {from} is out of range"))
        })?;
        Ok(Self { from, until })
    }

    /// Window covering the calendar day `date` (UTC).
    pub fn day_starting(date: NaiveDate) -> Result<Self, BookingError> {
        Self::starting_at(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    pub fn contains(&self, route: &Route) -> bool {
        route.departs_within(self.from, self.until)
    }
}
