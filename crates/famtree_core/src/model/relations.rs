//! Derived relationship view.
//!
//! Not persisted. Rebuilt from the full person set on every read by
//! [`crate::graph::derive_relations`].

use crate::model::person::{Person, PersonId};
use serde::{Deserialize, Serialize};

/// Which parent a half-sibling shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommonParent {
    Father,
    Mother,
}

/// Id + display name of a related person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeSummary {
    pub id: PersonId,
    pub name: String,
}

impl RelativeSummary {
    pub fn of(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.display_name(),
        }
    }
}

/// Spouse summary carrying the viewing person's marriage dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseSummary {
    pub id: PersonId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date_hebrew: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingSummary {
    pub id: PersonId,
    pub name: String,
    pub is_half_sibling: bool,
    /// Set only for half-siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_parent: Option<CommonParent>,
}

impl SiblingSummary {
    pub fn full(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.display_name(),
            is_half_sibling: false,
            common_parent: None,
        }
    }

    pub fn half(person: &Person, common_parent: CommonParent) -> Self {
        Self {
            id: person.id.clone(),
            name: person.display_name(),
            is_half_sibling: true,
            common_parent: Some(common_parent),
        }
    }
}

/// Person record annotated with resolved relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonWithRelations {
    #[serde(flatten)]
    pub person: Person,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<RelativeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<RelativeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse: Option<SpouseSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RelativeSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siblings: Vec<SiblingSummary>,
}

impl PersonWithRelations {
    pub fn id(&self) -> &str {
        &self.person.id
    }

    /// Returns the sibling entry for `id`, if derived.
    pub fn sibling(&self, id: &str) -> Option<&SiblingSummary> {
        self.siblings.iter().find(|sibling| sibling.id == id)
    }
}
