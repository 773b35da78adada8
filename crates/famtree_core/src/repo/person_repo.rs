//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the store adapter used by linking and read paths: exact-match
//!   lookup, equality-filter lookup, insert, field patch and delete.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths validate records/patches before SQL mutations.
//! - Read paths return rows in insertion order.
//! - Read paths reject invalid persisted state instead of masking it.
//! - No call spans more than one statement; callers get no cross-call
//!   transactional guarantees.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::person::{
    normalize_gregorian_input, DateFormat, Person, PersonId, PersonPatch, PersonValidationError,
};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PERSON_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    birth_date_gregorian,
    birth_date_hebrew,
    death_date_gregorian,
    death_date_hebrew,
    father_id,
    mother_id,
    spouse_id,
    marriage_date,
    marriage_date_hebrew,
    email,
    phone,
    primary_date_format,
    notify_on_birthday,
    notify_on_anniversary,
    hidden
FROM people";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for person persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PersonValidationError),
    Db(DbError),
    NotFound(PersonId),
    /// Insert collided with an existing identifier.
    Duplicate(PersonId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::Duplicate(id) => write!(f, "person id already exists: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "person repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Simple-equality predicate over person references.
///
/// Set fields are AND-ed together. An empty filter matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFilter {
    pub father_id: Option<PersonId>,
    pub mother_id: Option<PersonId>,
    pub spouse_id: Option<PersonId>,
    /// Matches when either parent slot equals this id.
    pub parent_id: Option<PersonId>,
    /// Drops the record with this id from the result.
    pub exclude_id: Option<PersonId>,
}

impl PersonFilter {
    /// Everyone listing `id` as father or mother.
    pub fn children_of(id: impl Into<PersonId>) -> Self {
        Self {
            parent_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_father(id: impl Into<PersonId>) -> Self {
        Self {
            father_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_mother(id: impl Into<PersonId>) -> Self {
        Self {
            mother_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, id: impl Into<PersonId>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    /// In-memory evaluation, mirroring the SQL predicate.
    pub fn matches(&self, person: &Person) -> bool {
        fn slot_is(slot: &Option<PersonId>, expected: &Option<PersonId>) -> bool {
            match expected {
                Some(expected) => slot.as_deref() == Some(expected.as_str()),
                None => true,
            }
        }

        if self.exclude_id.as_deref() == Some(person.id.as_str()) {
            return false;
        }
        if let Some(parent_id) = &self.parent_id {
            let is_parent = person.father_id.as_deref() == Some(parent_id.as_str())
                || person.mother_id.as_deref() == Some(parent_id.as_str());
            if !is_parent {
                return false;
            }
        }
        slot_is(&person.father_id, &self.father_id)
            && slot_is(&person.mother_id, &self.mother_id)
            && slot_is(&person.spouse_id, &self.spouse_id)
    }
}

/// Store adapter for person records.
pub trait PersonRepository {
    /// Inserts a new record. Fails with `Duplicate` on id collision.
    fn insert_person(&self, person: &Person) -> RepoResult<()>;
    /// Exact-match lookup by identifier, hidden records included.
    fn get_person(&self, id: &str) -> RepoResult<Option<Person>>;
    /// Equality-filter lookup, hidden records included.
    fn find_people(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>>;
    /// Applies a partial update. Fails with `NotFound` for unknown ids.
    fn patch_person(&self, id: &str, patch: &PersonPatch) -> RepoResult<()>;
    /// Hard-deletes one record. References to it are left dangling.
    fn delete_person(&self, id: &str) -> RepoResult<()>;
    /// Removes every record and returns how many were deleted.
    fn delete_all(&self) -> RepoResult<usize>;

    fn exists(&self, id: &str) -> RepoResult<bool> {
        Ok(self.get_person(id)?.is_some())
    }

    /// Full snapshot in insertion order.
    fn list_people(&self) -> RepoResult<Vec<Person>> {
        self.find_people(&PersonFilter::default())
    }
}

impl<R: PersonRepository + ?Sized> PersonRepository for &R {
    fn insert_person(&self, person: &Person) -> RepoResult<()> {
        (**self).insert_person(person)
    }

    fn get_person(&self, id: &str) -> RepoResult<Option<Person>> {
        (**self).get_person(id)
    }

    fn find_people(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>> {
        (**self).find_people(filter)
    }

    fn patch_person(&self, id: &str, patch: &PersonPatch) -> RepoResult<()> {
        (**self).patch_person(id, patch)
    }

    fn delete_person(&self, id: &str) -> RepoResult<()> {
        (**self).delete_person(id)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        (**self).delete_all()
    }
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn insert_person(&self, person: &Person) -> RepoResult<()> {
        person.validate()?;

        let result = self.conn.execute(
            "INSERT INTO people (
                id,
                first_name,
                last_name,
                birth_date_gregorian,
                birth_date_hebrew,
                death_date_gregorian,
                death_date_hebrew,
                father_id,
                mother_id,
                spouse_id,
                marriage_date,
                marriage_date_hebrew,
                email,
                phone,
                primary_date_format,
                notify_on_birthday,
                notify_on_anniversary,
                hidden
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18);",
            params![
                person.id.as_str(),
                person.first_name.as_str(),
                person.last_name.as_str(),
                person.birth_date_gregorian.as_deref(),
                person.birth_date_hebrew.as_deref(),
                person.death_date_gregorian.as_deref(),
                person.death_date_hebrew.as_deref(),
                person.father_id.as_deref(),
                person.mother_id.as_deref(),
                person.spouse_id.as_deref(),
                person.marriage_date.as_deref(),
                person.marriage_date_hebrew.as_deref(),
                person.email.as_deref(),
                person.phone.as_deref(),
                person.primary_date_format.as_str(),
                bool_to_int(person.notify_on_birthday),
                bool_to_int(person.notify_on_anniversary),
                bool_to_int(person.hidden),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(RepoError::Duplicate(person.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_person(&self, id: &str) -> RepoResult<Option<Person>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERSON_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }
        Ok(None)
    }

    fn find_people(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>> {
        let mut sql = format!("{PERSON_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        for (column, value) in [
            ("father_id", &filter.father_id),
            ("mother_id", &filter.mother_id),
            ("spouse_id", &filter.spouse_id),
        ] {
            if let Some(value) = value {
                sql.push_str(&format!(" AND {column} = ?"));
                bind_values.push(Value::Text(value.clone()));
            }
        }

        if let Some(parent_id) = &filter.parent_id {
            sql.push_str(" AND (father_id = ? OR mother_id = ?)");
            bind_values.push(Value::Text(parent_id.clone()));
            bind_values.push(Value::Text(parent_id.clone()));
        }

        if let Some(exclude_id) = &filter.exclude_id {
            sql.push_str(" AND id <> ?");
            bind_values.push(Value::Text(exclude_id.clone()));
        }

        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }
        Ok(people)
    }

    fn patch_person(&self, id: &str, patch: &PersonPatch) -> RepoResult<()> {
        patch.validate()?;

        let assignments = patch_assignments(patch);
        if assignments.is_empty() {
            return if self.exists(id)? {
                Ok(())
            } else {
                Err(RepoError::NotFound(id.to_string()))
            };
        }

        let mut sql = String::from("UPDATE people SET ");
        let mut bind_values: Vec<Value> = Vec::with_capacity(assignments.len() + 1);
        for (column, value) in assignments {
            sql.push_str(column);
            sql.push_str(" = ?, ");
            bind_values.push(value);
        }
        sql.push_str("updated_at = (strftime('%s', 'now') * 1000) WHERE id = ?;");
        bind_values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_person(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM people WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_all(&self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM people;", [])?)
    }
}

fn patch_assignments(patch: &PersonPatch) -> Vec<(&'static str, Value)> {
    let mut assignments = Vec::new();

    if let Some(value) = &patch.first_name {
        assignments.push(("first_name", Value::Text(value.trim().to_string())));
    }
    if let Some(value) = &patch.last_name {
        assignments.push(("last_name", Value::Text(value.trim().to_string())));
    }

    // Gregorian columns get the same ISO rewrite as inserts.
    for (column, update, gregorian) in [
        ("birth_date_gregorian", &patch.birth_date_gregorian, true),
        ("birth_date_hebrew", &patch.birth_date_hebrew, false),
        ("death_date_gregorian", &patch.death_date_gregorian, true),
        ("death_date_hebrew", &patch.death_date_hebrew, false),
        ("father_id", &patch.father_id, false),
        ("mother_id", &patch.mother_id, false),
        ("spouse_id", &patch.spouse_id, false),
        ("marriage_date", &patch.marriage_date, true),
        ("marriage_date_hebrew", &patch.marriage_date_hebrew, false),
        ("email", &patch.email, false),
        ("phone", &patch.phone, false),
    ] {
        if let Some(value) = update {
            let value = match value {
                Some(text) if gregorian => Value::Text(normalize_gregorian_input(text)),
                Some(text) => Value::Text(text.clone()),
                None => Value::Null,
            };
            assignments.push((column, value));
        }
    }

    if let Some(format) = patch.primary_date_format {
        assignments.push((
            "primary_date_format",
            Value::Text(format.as_str().to_string()),
        ));
    }
    for (column, flag) in [
        ("notify_on_birthday", patch.notify_on_birthday),
        ("notify_on_anniversary", patch.notify_on_anniversary),
        ("hidden", patch.hidden),
    ] {
        if let Some(flag) = flag {
            assignments.push((column, Value::Integer(bool_to_int(flag))));
        }
    }

    assignments
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let format_text: String = row.get("primary_date_format")?;
    let primary_date_format = DateFormat::parse(&format_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid date format `{format_text}` in people.primary_date_format"
        ))
    })?;

    let person = Person {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        birth_date_gregorian: row.get("birth_date_gregorian")?,
        birth_date_hebrew: row.get("birth_date_hebrew")?,
        death_date_gregorian: row.get("death_date_gregorian")?,
        death_date_hebrew: row.get("death_date_hebrew")?,
        father_id: row.get("father_id")?,
        mother_id: row.get("mother_id")?,
        spouse_id: row.get("spouse_id")?,
        marriage_date: row.get("marriage_date")?,
        marriage_date_hebrew: row.get("marriage_date_hebrew")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        primary_date_format,
        notify_on_birthday: parse_flag(row, "notify_on_birthday")?,
        notify_on_anniversary: parse_flag(row, "notify_on_anniversary")?,
        hidden: parse_flag(row, "hidden")?,
    };
    person.validate()?;
    Ok(person)
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in people.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
