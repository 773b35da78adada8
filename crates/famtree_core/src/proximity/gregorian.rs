//! Gregorian `dd/mm/yyyy` countdowns.

use super::{MalformedDate, FALLBACK_DAYS};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use log::debug;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Day and month of a recurring Gregorian date. The year is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

impl DayMonth {
    /// Parses `dd/mm/yyyy`. Only day and month must be numeric.
    pub fn parse(text: &str) -> Result<Self, MalformedDate> {
        let parts = text.split('/').collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(MalformedDate::FieldCount {
                expected: 3,
                found: parts.len(),
            });
        }

        let day = parse_field(parts[0], "day")?;
        let month = parse_field(parts[1], "month")?;
        if !(1..=31).contains(&day) {
            return Err(MalformedDate::OutOfRange {
                field: "day",
                value: day,
            });
        }
        if !(1..=12).contains(&month) {
            return Err(MalformedDate::OutOfRange {
                field: "month",
                value: month,
            });
        }

        Ok(Self {
            day: day as u32,
            month: month as u32,
        })
    }

    /// Midnight of this day/month in `year`.
    ///
    /// Days past the end of the month roll into the next one, so 29/02
    /// lands on 1 March in a common year.
    pub fn occurrence_in(self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, 1)?
            .checked_add_days(Days::new(u64::from(self.day - 1)))?
            .and_hms_opt(0, 0, 0)
    }

    /// Next occurrence at or after `now`.
    pub fn next_occurrence(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let this_year = self.occurrence_in(now.year())?;
        if this_year < now {
            self.occurrence_in(now.year() + 1)
        } else {
            Some(this_year)
        }
    }
}

fn parse_field(raw: &str, field: &'static str) -> Result<i64, MalformedDate> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| MalformedDate::NonNumeric { field })
}

/// Whole days (rounded up) until the next occurrence of `text`.
pub fn try_days_until(text: &str, now: NaiveDateTime) -> Result<i64, MalformedDate> {
    let day_month = DayMonth::parse(text)?;
    let next = day_month
        .next_occurrence(now)
        .ok_or_else(|| MalformedDate::Unparseable(text.to_string()))?;
    let millis = (next - now).num_milliseconds();
    Ok((millis + MILLIS_PER_DAY - 1).div_euclid(MILLIS_PER_DAY))
}

/// Like [`try_days_until`], falling back to [`FALLBACK_DAYS`].
pub fn days_until(text: &str, now: NaiveDateTime) -> i64 {
    try_days_until(text, now).unwrap_or_else(|err| {
        debug!("event=date_fallback module=proximity calendar=gregorian reason={err}");
        FALLBACK_DAYS
    })
}
