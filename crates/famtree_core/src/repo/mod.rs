//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the person store contract consumed by services.
//! - Isolate SQLite query details from linking/derivation logic.
//!
//! # Invariants
//! - Repository writes must enforce `Person::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Duplicate`) in
//!   addition to DB transport errors.

pub mod person_repo;
