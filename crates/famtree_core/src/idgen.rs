//! Candidate identifier generators.
//!
//! Generators only propose tokens; uniqueness is confirmed against the store
//! by the caller (see `PersonService::create_person`).

use crate::model::person::PersonId;
use rand::Rng;
use uuid::Uuid;

/// Source of candidate person identifiers.
pub trait IdGenerator {
    fn next_id(&self) -> PersonId;
}

/// Random nine-digit decimal identifiers, e.g. `"483920175"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericIdGenerator;

impl IdGenerator for NumericIdGenerator {
    fn next_id(&self) -> PersonId {
        rand::rng()
            .random_range(100_000_000u32..1_000_000_000u32)
            .to_string()
    }
}

/// Random UUIDv4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> PersonId {
        Uuid::new_v4().to_string()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn next_id(&self) -> PersonId {
        (**self).next_id()
    }
}
