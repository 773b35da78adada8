//! Core domain logic for famtree.
//! Person storage, relationship linking, relation derivation and date
//! proximity live here; front ends only translate input and output.

pub mod config;
pub mod db;
pub mod graph;
pub mod idgen;
pub mod logging;
pub mod model;
pub mod proximity;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use graph::derive_relations;
pub use idgen::{IdGenerator, NumericIdGenerator, UuidIdGenerator};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::person::{DateFormat, NewPerson, Person, PersonId, PersonPatch};
pub use model::relations::{
    CommonParent, PersonWithRelations, RelativeSummary, SiblingSummary, SpouseSummary,
};
pub use proximity::{upcoming_dates, HebrewDate, HebrewMonth, ProximityContext, UpcomingDates};
pub use repo::person_repo::{
    PersonFilter, PersonRepository, RepoError, RepoResult, SqlitePersonRepository,
};
pub use service::linking::{
    infer_parent_role, plan_links, LinkMutation, LinkReport, ParentRole, ParentType,
    RelationshipIntent, RelationshipType, SelectedRelationships, DEFAULT_PARENT_ROLE,
};
pub use service::person_service::{PersonService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
