//! Family domain model.
//!
//! # Responsibility
//! - Define the persisted person record and its partial-update shape.
//! - Define the derived relationship view returned by read paths.
//!
//! # Invariants
//! - Every person is identified by a stable `PersonId` assigned at creation.
//! - Parent/spouse references are weak identifier lookups, never ownership.
//! - Sibling status is derived on read and never stored.

pub mod person;
pub mod relations;
