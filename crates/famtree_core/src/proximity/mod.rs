//! Date proximity engine.
//!
//! # Responsibility
//! - Count days until the next birthday/anniversary in either calendar.
//! - Build the ascending upcoming-dates lists consumed by presentation.
//!
//! # Invariants
//! - Malformed dates never fail a computation; they count as
//!   [`FALLBACK_DAYS`].
//! - Gregorian countdowns for valid `dd/mm/yyyy` input stay within
//!   `0..=366`.
//! - Hebrew countdowns are an approximation over a 29.5-day month.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod gregorian;
pub mod hebrew;
pub mod upcoming;

pub use hebrew::{HebrewDate, HebrewMonth};
pub use upcoming::{
    upcoming_dates, ProximityContext, UpcomingAnniversary, UpcomingBirthday, UpcomingDates,
};

/// Countdown used when a date cannot be interpreted.
pub const FALLBACK_DAYS: i64 = 30;

/// Why a stored date string could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedDate {
    FieldCount { expected: usize, found: usize },
    NonNumeric { field: &'static str },
    OutOfRange { field: &'static str, value: i64 },
    UnknownMonth(String),
    /// No current Hebrew date was supplied by the caller.
    MissingCurrentDate,
    Unparseable(String),
}

impl Display for MalformedDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount { expected, found } => {
                write!(f, "expected {expected} date fields, found {found}")
            }
            Self::NonNumeric { field } => write!(f, "date {field} is not numeric"),
            Self::OutOfRange { field, value } => {
                write!(f, "date {field} `{value}` is out of range")
            }
            Self::UnknownMonth(name) => write!(f, "unknown Hebrew month `{name}`"),
            Self::MissingCurrentDate => write!(f, "current Hebrew date is unavailable"),
            Self::Unparseable(text) => write!(f, "cannot parse date `{text}`"),
        }
    }
}

impl Error for MalformedDate {}
