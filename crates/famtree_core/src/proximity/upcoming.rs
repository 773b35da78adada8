//! Upcoming birthday and anniversary lists.

use super::{gregorian, hebrew, HebrewDate};
use crate::model::person::{DateFormat, Person};
use crate::model::relations::PersonWithRelations;
use chrono::{Local, NaiveDateTime};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// Clock readings the countdowns are measured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityContext {
    pub now: NaiveDateTime,
    /// Today's Hebrew date, when a converter is available to the caller.
    pub hebrew_today: Option<HebrewDate>,
}

impl ProximityContext {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            hebrew_today: None,
        }
    }

    /// Context at the local wall-clock time.
    pub fn local_now() -> Self {
        Self::new(Local::now().naive_local())
    }

    pub fn with_hebrew_today(mut self, today: HebrewDate) -> Self {
        self.hebrew_today = Some(today);
        self
    }

    /// Days until `date`, interpreted in the calendar `format` selects.
    pub fn days_until(&self, date: &str, format: DateFormat) -> i64 {
        match format {
            DateFormat::Hebrew => hebrew::days_until(date, self.hebrew_today.as_ref()),
            DateFormat::Gregorian | DateFormat::Both => gregorian::days_until(date, self.now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBirthday {
    pub person: PersonWithRelations,
    pub date: String,
    pub days_until: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAnniversary {
    /// `[person, spouse]`, lower id first.
    pub couple: [PersonWithRelations; 2],
    pub date: String,
    pub days_until: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDates {
    pub birthdays: Vec<UpcomingBirthday>,
    pub anniversaries: Vec<UpcomingAnniversary>,
}

/// Builds both upcoming lists, each sorted ascending by `days_until`.
///
/// Birthdays need `notify_on_birthday` and a date in the person's primary
/// calendar. An anniversary is emitted from the partner with the smaller id,
/// which must have `notify_on_anniversary`, a marriage date, and a spouse
/// present in `people`.
pub fn upcoming_dates(people: &[PersonWithRelations], ctx: &ProximityContext) -> UpcomingDates {
    let by_id = people
        .iter()
        .map(|entry| (entry.id(), entry))
        .collect::<HashMap<_, _>>();

    let mut birthdays = people
        .iter()
        .filter(|entry| entry.person.notify_on_birthday)
        .filter_map(|entry| {
            let date = entry.person.primary_birth_date()?;
            Some(UpcomingBirthday {
                person: entry.clone(),
                date: date.to_string(),
                days_until: days_until(ctx, &entry.person, date),
            })
        })
        .collect::<Vec<_>>();

    let mut anniversaries = people
        .iter()
        .filter(|entry| entry.person.notify_on_anniversary)
        .filter_map(|entry| {
            let spouse_id = entry.spouse.as_ref()?.id.as_str();
            let spouse = by_id.get(spouse_id)?;
            if entry.id() >= spouse.id() {
                return None;
            }
            let date = entry.person.primary_marriage_date()?;
            Some(UpcomingAnniversary {
                couple: [entry.clone(), (*spouse).clone()],
                date: date.to_string(),
                days_until: days_until(ctx, &entry.person, date),
            })
        })
        .collect::<Vec<_>>();

    birthdays.sort_by_key(|item| item.days_until);
    anniversaries.sort_by_key(|item| item.days_until);

    debug!(
        "event=upcoming_dates module=proximity status=ok birthdays={} anniversaries={}",
        birthdays.len(),
        anniversaries.len()
    );

    UpcomingDates {
        birthdays,
        anniversaries,
    }
}

fn days_until(ctx: &ProximityContext, person: &Person, date: &str) -> i64 {
    ctx.days_until(date, person.primary_date_format)
}
