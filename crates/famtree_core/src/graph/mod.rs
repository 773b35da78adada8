//! Read-side relationship graph.
//!
//! # Responsibility
//! - Rebuild father/mother/spouse/children/sibling relations from a flat
//!   snapshot of person records.
//!
//! # Invariants
//! - Pure: no store access, no retained state between calls.
//! - Hidden persons and dangling references never surface in the output.

pub mod derive;

pub use derive::derive_relations;
