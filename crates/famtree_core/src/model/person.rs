//! Person domain model.
//!
//! # Responsibility
//! - Define the canonical persisted record for one family member.
//! - Define creation input (`NewPerson`) and field-patch input (`PersonPatch`).
//!
//! # Invariants
//! - `id` is stable, unique and never patched.
//! - `first_name`/`last_name` are non-blank after trim.
//! - `father_id`/`mother_id`/`spouse_id` may dangle; readers must tolerate it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid iso date regex"));

/// Stable identifier for a person record.
///
/// Kept as a type alias; identifiers are opaque tokens from an `IdGenerator`.
pub type PersonId = String;

/// Calendar system treated as authoritative for date proximity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// Gregorian `dd/mm/yyyy` dates.
    #[default]
    Gregorian,
    /// Hebrew `<day> <month> <year>` dates.
    Hebrew,
    /// Both are recorded; Gregorian drives proximity.
    Both,
}

impl DateFormat {
    /// Stable storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gregorian => "gregorian",
            Self::Hebrew => "hebrew",
            Self::Both => "both",
        }
    }

    /// Parses a storage/wire label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gregorian" => Some(Self::Gregorian),
            "hebrew" => Some(Self::Hebrew),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Canonical persisted record for one family member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date_gregorian: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date_hebrew: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date_gregorian: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date_hebrew: Option<String>,
    /// Weak reference to the father's record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<PersonId>,
    /// Weak reference to the mother's record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<PersonId>,
    /// Weak reference to the spouse's record. Symmetric only at link time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse_id: Option<PersonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date_hebrew: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub primary_date_format: DateFormat,
    #[serde(default)]
    pub notify_on_birthday: bool,
    #[serde(default)]
    pub notify_on_anniversary: bool,
    /// Excludes the record from derived views without deleting it.
    #[serde(default)]
    pub hidden: bool,
}

/// Validation failures for person records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    EmptyId,
    BlankFirstName,
    BlankLastName,
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "person id must not be empty"),
            Self::BlankFirstName => write!(f, "first name must not be blank"),
            Self::BlankLastName => write!(f, "last name must not be blank"),
        }
    }
}

impl Error for PersonValidationError {}

impl Person {
    /// Creates a bare record with the given identity and names.
    pub fn new(
        id: impl Into<PersonId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date_gregorian: None,
            birth_date_hebrew: None,
            death_date_gregorian: None,
            death_date_hebrew: None,
            father_id: None,
            mother_id: None,
            spouse_id: None,
            marriage_date: None,
            marriage_date_hebrew: None,
            email: None,
            phone: None,
            primary_date_format: DateFormat::default(),
            notify_on_birthday: false,
            notify_on_anniversary: false,
            hidden: false,
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.id.trim().is_empty() {
            return Err(PersonValidationError::EmptyId);
        }
        if self.first_name.trim().is_empty() {
            return Err(PersonValidationError::BlankFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(PersonValidationError::BlankLastName);
        }
        Ok(())
    }

    /// Display label used in relation summaries.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Substring match used by people search.
    ///
    /// `term` must already be trimmed and lowercased. Names and email match
    /// case-insensitively; phone numbers match verbatim.
    pub fn matches_search(&self, term: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(term);
        contains(&self.first_name)
            || contains(&self.last_name)
            || contains(&self.display_name())
            || self.email.as_deref().is_some_and(contains)
            || self
                .phone
                .as_deref()
                .is_some_and(|phone| phone.contains(term))
    }

    /// Birth date string selected by `primary_date_format`.
    pub fn primary_birth_date(&self) -> Option<&str> {
        match self.primary_date_format {
            DateFormat::Hebrew => self.birth_date_hebrew.as_deref(),
            DateFormat::Gregorian | DateFormat::Both => self.birth_date_gregorian.as_deref(),
        }
    }

    /// Marriage date string selected by `primary_date_format`.
    pub fn primary_marriage_date(&self) -> Option<&str> {
        match self.primary_date_format {
            DateFormat::Hebrew => self.marriage_date_hebrew.as_deref(),
            DateFormat::Gregorian | DateFormat::Both => self.marriage_date.as_deref(),
        }
    }
}

/// Caller-supplied fields for a person that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub birth_date_gregorian: Option<String>,
    pub birth_date_hebrew: Option<String>,
    pub death_date_gregorian: Option<String>,
    pub death_date_hebrew: Option<String>,
    pub father_id: Option<PersonId>,
    pub mother_id: Option<PersonId>,
    pub spouse_id: Option<PersonId>,
    pub marriage_date: Option<String>,
    pub marriage_date_hebrew: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub primary_date_format: DateFormat,
    pub notify_on_birthday: bool,
    pub notify_on_anniversary: bool,
}

impl NewPerson {
    pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Materializes the record under an assigned identifier.
    ///
    /// Names are trimmed; ISO Gregorian dates become `dd/mm/yyyy`; blank
    /// optional strings are dropped.
    pub fn into_person(self, id: PersonId) -> Person {
        Person {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            birth_date_gregorian: non_blank(self.birth_date_gregorian)
                .map(|value| normalize_gregorian_input(&value)),
            birth_date_hebrew: non_blank(self.birth_date_hebrew),
            death_date_gregorian: non_blank(self.death_date_gregorian)
                .map(|value| normalize_gregorian_input(&value)),
            death_date_hebrew: non_blank(self.death_date_hebrew),
            father_id: non_blank(self.father_id),
            mother_id: non_blank(self.mother_id),
            spouse_id: non_blank(self.spouse_id),
            marriage_date: non_blank(self.marriage_date)
                .map(|value| normalize_gregorian_input(&value)),
            marriage_date_hebrew: non_blank(self.marriage_date_hebrew),
            email: non_blank(self.email),
            phone: non_blank(self.phone),
            primary_date_format: self.primary_date_format,
            notify_on_birthday: self.notify_on_birthday,
            notify_on_anniversary: self.notify_on_anniversary,
            hidden: false,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Rewrites `yyyy-mm-dd` into `dd/mm/yyyy`; anything else is returned as-is.
pub fn normalize_gregorian_input(value: &str) -> String {
    let trimmed = value.trim();
    match ISO_DATE_RE.captures(trimmed) {
        Some(caps) => format!("{:0>2}/{:0>2}/{}", &caps[3], &caps[2], &caps[1]),
        None => trimmed.to_string(),
    }
}

/// Partial update for an existing person.
///
/// Nullable fields use `Option<Option<T>>`: `None` leaves the field alone,
/// `Some(None)` clears it, `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub birth_date_gregorian: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub birth_date_hebrew: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub death_date_gregorian: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub death_date_hebrew: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub father_id: Option<Option<PersonId>>,
    #[serde(deserialize_with = "double_option")]
    pub mother_id: Option<Option<PersonId>>,
    #[serde(deserialize_with = "double_option")]
    pub spouse_id: Option<Option<PersonId>>,
    #[serde(deserialize_with = "double_option")]
    pub marriage_date: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub marriage_date_hebrew: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    pub primary_date_format: Option<DateFormat>,
    pub notify_on_birthday: Option<bool>,
    pub notify_on_anniversary: Option<bool>,
    pub hidden: Option<bool>,
}

impl PersonPatch {
    pub fn set_father(id: impl Into<PersonId>) -> Self {
        Self {
            father_id: Some(Some(id.into())),
            ..Self::default()
        }
    }

    pub fn set_mother(id: impl Into<PersonId>) -> Self {
        Self {
            mother_id: Some(Some(id.into())),
            ..Self::default()
        }
    }

    /// Spouse link plus the couple's shared marriage dates.
    pub fn set_spouse(
        id: impl Into<PersonId>,
        marriage_date: Option<String>,
        marriage_date_hebrew: Option<String>,
    ) -> Self {
        Self {
            spouse_id: Some(Some(id.into())),
            marriage_date: Some(marriage_date),
            marriage_date_hebrew: Some(marriage_date_hebrew),
            ..Self::default()
        }
    }

    /// Returns whether applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks that patched names stay non-blank.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if matches!(&self.first_name, Some(name) if name.trim().is_empty()) {
            return Err(PersonValidationError::BlankFirstName);
        }
        if matches!(&self.last_name, Some(name) if name.trim().is_empty()) {
            return Err(PersonValidationError::BlankLastName);
        }
        Ok(())
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
