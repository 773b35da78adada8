//! Person use-case service.
//!
//! # Responsibility
//! - Write path: generate id, insert, then run the linking protocol.
//! - Read path: bulk read, derive relations, compute upcoming dates.
//! - Direct get/update/delete by identifier, bulk delete and search.
//!
//! # Invariants
//! - A created person persists even when linking fails afterwards.
//! - Identifiers are confirmed unused before insert; generation is bounded
//!   by [`MAX_ID_ATTEMPTS`].

use crate::graph::derive_relations;
use crate::idgen::IdGenerator;
use crate::model::person::{NewPerson, Person, PersonId, PersonPatch};
use crate::model::relations::PersonWithRelations;
use crate::proximity::{upcoming_dates, ProximityContext, UpcomingDates};
use crate::repo::person_repo::{PersonRepository, RepoError};
use crate::service::linking::{link_new_person, FailedMutation, LinkReport, RelationshipIntent};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound on candidate ids tried before giving up.
pub const MAX_ID_ATTEMPTS: usize = 32;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from person service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Repository-level failure.
    Repo(RepoError),
    /// Target person does not exist.
    NotFound(PersonId),
    /// Every candidate id collided with an existing record.
    IdExhausted { attempts: usize },
    /// Linking could not read the records it plans from. The new person
    /// exists but is unlinked.
    LinkSnapshot {
        person_id: PersonId,
        source: RepoError,
    },
    /// Some planned link mutations failed; the rest were applied.
    PartialFanout {
        person_id: PersonId,
        applied: usize,
        failed: Vec<FailedMutation>,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::IdExhausted { attempts } => {
                write!(f, "no unused person id after {attempts} attempts")
            }
            Self::LinkSnapshot { person_id, source } => write!(
                f,
                "person {person_id} created but linking could not read relatives: {source}"
            ),
            Self::PartialFanout {
                person_id,
                applied,
                failed,
            } => write!(
                f,
                "person {person_id} created; {applied} link updates applied, {} failed",
                failed.len()
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::LinkSnapshot { source, .. } => Some(source),
            Self::PartialFanout { failed, .. } => {
                failed.first().map(|item| &item.error as &(dyn Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Person service facade.
pub struct PersonService<R: PersonRepository, G: IdGenerator> {
    repo: R,
    ids: G,
}

impl<R: PersonRepository, G: IdGenerator> PersonService<R, G> {
    /// Creates service from repository and id generator implementations.
    pub fn new(repo: R, ids: G) -> Self {
        Self { repo, ids }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates a person and applies the optional relationship intent.
    ///
    /// # Errors
    /// - `LinkSnapshot` / `PartialFanout` are reported after the insert; the
    ///   person is kept in both cases.
    pub fn create_person(
        &self,
        input: NewPerson,
        intent: Option<&RelationshipIntent>,
    ) -> ServiceResult<Person> {
        let person = self.insert_with_fresh_id(input)?;
        info!(
            "event=person_create module=service status=ok person_id={}",
            person.id
        );

        let Some(intent) = intent else {
            return Ok(person);
        };

        let report = match link_new_person(&self.repo, &person, intent) {
            Ok(Some(report)) => report,
            Ok(None) => return Ok(person),
            Err(source) => {
                warn!(
                    "event=person_link module=service status=error person_id={} error={source}",
                    person.id
                );
                return Err(ServiceError::LinkSnapshot {
                    person_id: person.id,
                    source,
                });
            }
        };

        self.finish_link(person, report)
    }

    fn insert_with_fresh_id(&self, input: NewPerson) -> ServiceResult<Person> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = self.ids.next_id();
            if self.repo.exists(&candidate)? {
                continue;
            }
            let person = input.clone().into_person(candidate);
            match self.repo.insert_person(&person) {
                Ok(()) => return Ok(person),
                // Lost a race for the id; try another one.
                Err(RepoError::Duplicate(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        warn!(
            "event=person_create module=service status=error reason=id_exhausted attempts={MAX_ID_ATTEMPTS}"
        );
        Err(ServiceError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    fn finish_link(&self, person: Person, report: LinkReport) -> ServiceResult<Person> {
        if !report.is_complete() {
            return Err(ServiceError::PartialFanout {
                person_id: person.id,
                applied: report.applied.len(),
                failed: report.failed,
            });
        }
        // Linking may have patched the new record itself.
        match self.repo.get_person(&person.id) {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(person),
            Err(err) => {
                warn!(
                    "event=person_link module=service status=degraded person_id={} reason=reread_failed error={err}",
                    person.id
                );
                Ok(person)
            }
        }
    }

    /// Gets one person by id, hidden records included.
    pub fn get_person(&self, id: &str) -> ServiceResult<Person> {
        self.repo
            .get_person(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Gets one person with derived relations from the full snapshot.
    pub fn get_with_relations(&self, id: &str) -> ServiceResult<PersonWithRelations> {
        self.list_with_relations()?
            .into_iter()
            .find(|entry| entry.id() == id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Applies a field patch and returns the updated record.
    pub fn update_person(&self, id: &str, patch: &PersonPatch) -> ServiceResult<Person> {
        self.repo.patch_person(id, patch)?;
        info!("event=person_update module=service status=ok person_id={id}");
        self.get_person(id)
    }

    /// Hard-deletes one person. References to it are left dangling.
    pub fn delete_person(&self, id: &str) -> ServiceResult<()> {
        self.repo.delete_person(id)?;
        info!("event=person_delete module=service status=ok person_id={id}");
        Ok(())
    }

    /// Removes every person and returns how many were deleted.
    pub fn delete_all(&self) -> ServiceResult<usize> {
        let removed = self.repo.delete_all()?;
        info!("event=person_delete_all module=service status=ok removed={removed}");
        Ok(removed)
    }

    /// Visible people whose name, email or phone contains `term`.
    ///
    /// A blank term matches nobody.
    pub fn search(&self, term: &str) -> ServiceResult<Vec<PersonWithRelations>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let mut people = self.list_with_relations()?;
        people.retain(|entry| entry.person.matches_search(&term));
        Ok(people)
    }

    /// Every visible person with derived relations, in insertion order.
    pub fn list_with_relations(&self) -> ServiceResult<Vec<PersonWithRelations>> {
        let people = self.repo.list_people()?;
        Ok(derive_relations(&people))
    }

    /// Upcoming birthdays and anniversaries for visible people.
    pub fn upcoming_dates(&self, ctx: &ProximityContext) -> ServiceResult<UpcomingDates> {
        let people = self.list_with_relations()?;
        Ok(upcoming_dates(&people, ctx))
    }
}
