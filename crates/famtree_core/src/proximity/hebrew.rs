//! Hebrew-calendar countdowns.
//!
//! Calendar conversion is external: callers supply today's Hebrew date.
//! This module only orders months and estimates the distance between two
//! day/month pairs with a 29.5-day average month.
//!
//! # Invariants
//! - Month table: Tishrei=1 … Elul=13, Adar I=6, Adar II=7.
//! - Plain Adar is month 7 in a leap year and month 6 otherwise; Adar I/II
//!   collapse to month 6 in a common year.
//! - A same-month date on or after today yields an exact day difference.

use super::{MalformedDate, FALLBACK_DAYS};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Average synodic month length used by the approximation.
pub const AVERAGE_MONTH_DAYS: f64 = 29.5;

static HEBREW_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})\s+(.+?)\s+(\d{1,5})\s*$").expect("valid hebrew date regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HebrewMonth {
    Tishrei,
    Cheshvan,
    Kislev,
    Tevet,
    Shevat,
    Adar,
    AdarI,
    AdarII,
    Nisan,
    Iyar,
    Sivan,
    Tammuz,
    Av,
    Elul,
}

impl HebrewMonth {
    /// Parses a month name in Hebrew script or Latin transliteration.
    ///
    /// Accepts the `ב` prefix used in running text ("בניסן").
    pub fn parse(name: &str) -> Option<Self> {
        let key = month_key(name);
        Self::from_key(&key).or_else(|| key.strip_prefix('ב').and_then(Self::from_key))
    }

    fn from_key(key: &str) -> Option<Self> {
        let month = match key {
            "tishrei" | "tishri" | "תשרי" => Self::Tishrei,
            "cheshvan" | "heshvan" | "marcheshvan" | "חשון" | "חשוון" | "מרחשון" | "מרחשוון" => {
                Self::Cheshvan
            }
            "kislev" | "כסלו" | "כסליו" => Self::Kislev,
            "tevet" | "teves" | "טבת" => Self::Tevet,
            "shevat" | "shvat" | "שבט" => Self::Shevat,
            "adar" | "אדר" => Self::Adar,
            "adari" | "adar1" | "אדרא" => Self::AdarI,
            "adarii" | "adar2" | "אדרב" => Self::AdarII,
            "nisan" | "nissan" | "ניסן" => Self::Nisan,
            "iyar" | "iyyar" | "אייר" | "איר" => Self::Iyar,
            "sivan" | "סיון" | "סיוון" => Self::Sivan,
            "tammuz" | "tamuz" | "תמוז" => Self::Tammuz,
            "av" | "menachemav" | "אב" => Self::Av,
            "elul" | "אלול" => Self::Elul,
            _ => return None,
        };
        Some(month)
    }

    /// Position in the fixed month-ordering table (Tishrei=1 … Elul=13).
    pub fn table_position(self) -> u32 {
        match self {
            Self::Tishrei => 1,
            Self::Cheshvan => 2,
            Self::Kislev => 3,
            Self::Tevet => 4,
            Self::Shevat => 5,
            Self::Adar | Self::AdarI => 6,
            Self::AdarII => 7,
            Self::Nisan => 8,
            Self::Iyar => 9,
            Self::Sivan => 10,
            Self::Tammuz => 11,
            Self::Av => 12,
            Self::Elul => 13,
        }
    }

    /// 1-based month index within a year of the given kind.
    fn ordinal(self, leap_year: bool) -> u32 {
        match (self, leap_year) {
            (Self::Adar, true) => 7,
            (_, true) => self.table_position(),
            (Self::Adar | Self::AdarI | Self::AdarII, false) => 6,
            (month, false) if month.table_position() > 7 => month.table_position() - 1,
            (month, false) => month.table_position(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tishrei => "Tishrei",
            Self::Cheshvan => "Cheshvan",
            Self::Kislev => "Kislev",
            Self::Tevet => "Tevet",
            Self::Shevat => "Shevat",
            Self::Adar => "Adar",
            Self::AdarI => "Adar I",
            Self::AdarII => "Adar II",
            Self::Nisan => "Nisan",
            Self::Iyar => "Iyar",
            Self::Sivan => "Sivan",
            Self::Tammuz => "Tammuz",
            Self::Av => "Av",
            Self::Elul => "Elul",
        }
    }
}

fn month_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\'' | '׳' | '’' | '`' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a Hebrew year has thirteen months (Metonic cycle years
/// 3, 6, 8, 11, 14, 17, 19).
pub fn is_leap_year(year: i32) -> bool {
    (7 * i64::from(year) + 1).rem_euclid(19) < 7
}

fn months_in_year(leap_year: bool) -> u32 {
    if leap_year {
        13
    } else {
        12
    }
}

/// A Hebrew calendar date as a day/month/year triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HebrewDate {
    pub day: u32,
    pub month: HebrewMonth,
    pub year: i32,
}

impl HebrewDate {
    pub fn new(day: u32, month: HebrewMonth, year: i32) -> Self {
        Self { day, month, year }
    }

    /// Parses `"<day> <month> <year>"`, e.g. `"15 Nisan 5783"` or
    /// `"3 באדר ב׳ 5784"`.
    pub fn parse(text: &str) -> Result<Self, MalformedDate> {
        let caps = HEBREW_DATE_RE
            .captures(text)
            .ok_or_else(|| MalformedDate::Unparseable(text.to_string()))?;

        let day = caps[1]
            .parse::<u32>()
            .map_err(|_| MalformedDate::NonNumeric { field: "day" })?;
        if !(1..=30).contains(&day) {
            return Err(MalformedDate::OutOfRange {
                field: "day",
                value: i64::from(day),
            });
        }
        let month = HebrewMonth::parse(&caps[2])
            .ok_or_else(|| MalformedDate::UnknownMonth(caps[2].to_string()))?;
        let year = caps[3]
            .parse::<i32>()
            .map_err(|_| MalformedDate::NonNumeric { field: "year" })?;

        Ok(Self { day, month, year })
    }
}

impl FromStr for HebrewDate {
    type Err = MalformedDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for HebrewDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.day, self.month.name(), self.year)
    }
}

/// Estimated days from `today` until the next occurrence of `target`.
///
/// Only the target's day and month are used; the year of `today` decides
/// whether the year being counted through is a leap year.
pub fn estimate_days_between(today: &HebrewDate, target: &HebrewDate) -> i64 {
    let leap_year = is_leap_year(today.year);
    let current = today.month.ordinal(leap_year);
    let wanted = target.month.ordinal(leap_year);
    let day_delta = i64::from(target.day) - i64::from(today.day);

    if wanted == current && day_delta >= 0 {
        return day_delta;
    }

    let span = months_in_year(leap_year);
    let mut months_ahead = (wanted + span - current) % span;
    if months_ahead == 0 {
        months_ahead = span;
    }

    let estimate = f64::from(months_ahead) * AVERAGE_MONTH_DAYS + day_delta as f64;
    (estimate.round() as i64).max(0)
}

/// Parses `text` and estimates days until its next occurrence.
pub fn try_days_until(text: &str, today: Option<&HebrewDate>) -> Result<i64, MalformedDate> {
    let today = today.ok_or(MalformedDate::MissingCurrentDate)?;
    let target = HebrewDate::parse(text)?;
    Ok(estimate_days_between(today, &target))
}

/// Like [`try_days_until`], falling back to [`FALLBACK_DAYS`].
pub fn days_until(text: &str, today: Option<&HebrewDate>) -> i64 {
    try_days_until(text, today).unwrap_or_else(|err| {
        debug!("event=date_fallback module=proximity calendar=hebrew reason={err}");
        FALLBACK_DAYS
    })
}
