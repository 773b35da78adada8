//! Relationship linking protocol.
//!
//! # Responsibility
//! - Turn a `RelationshipIntent` for a freshly created person into the
//!   reference updates it implies on both records and on their relatives.
//! - Plan every mutation from one snapshot, then apply them in order.
//!
//! # Invariants
//! - `plan_links` is pure; all store reads happen in `LinkSnapshot::gather`.
//! - Mutations are applied sequentially. A failed mutation is recorded and
//!   the rest still run. Applied mutations are never rolled back.
//! - A missing related person makes the whole protocol a no-op.

use crate::model::person::{Person, PersonId, PersonPatch};
use crate::repo::person_repo::{PersonFilter, PersonRepository, RepoError, RepoResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the new person relates to the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// New person is the related person's spouse.
    Spouse,
    /// New person is the related person's child.
    Child,
    /// New person is the related person's sibling.
    Sibling,
    /// New person is the related person's parent.
    Parent,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spouse => "spouse",
            Self::Child => "child",
            Self::Sibling => "sibling",
            Self::Parent => "parent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentType {
    Father,
    Mother,
}

/// Which derived links the caller opted into.
///
/// The `Default` impl is used only when the whole selection is omitted;
/// flags missing from a supplied selection read as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedRelationships {
    #[serde(default)]
    pub share_father: bool,
    #[serde(default)]
    pub share_mother: bool,
    #[serde(default)]
    pub share_other_parent: bool,
    #[serde(default)]
    pub shared_children: HashMap<PersonId, bool>,
    #[serde(default)]
    pub shared_siblings: HashMap<PersonId, bool>,
}

impl Default for SelectedRelationships {
    fn default() -> Self {
        Self {
            share_father: true,
            share_mother: true,
            share_other_parent: true,
            shared_children: HashMap::new(),
            shared_siblings: HashMap::new(),
        }
    }
}

impl SelectedRelationships {
    pub fn shares_child(&self, id: &str) -> bool {
        self.shared_children.get(id).copied().unwrap_or(false)
    }

    pub fn shares_sibling(&self, id: &str) -> bool {
        self.shared_siblings.get(id).copied().unwrap_or(false)
    }
}

/// Caller instruction describing how a new person relates to an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipIntent {
    pub relationship_type: RelationshipType,
    pub related_person_id: PersonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<ParentType>,
    #[serde(rename = "selectedRelationships", default)]
    pub selected: SelectedRelationships,
}

impl RelationshipIntent {
    pub fn new(relationship_type: RelationshipType, related_person_id: impl Into<PersonId>) -> Self {
        Self {
            relationship_type,
            related_person_id: related_person_id.into(),
            parent_type: None,
            selected: SelectedRelationships::default(),
        }
    }

    pub fn with_parent_type(mut self, parent_type: ParentType) -> Self {
        self.parent_type = Some(parent_type);
        self
    }

    pub fn with_selection(mut self, selected: SelectedRelationships) -> Self {
        self.selected = selected;
        self
    }
}

/// Parental role of an existing person, inferred from recorded children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRole {
    Father,
    Mother,
    Unknown,
}

/// Slot used when the role of a new child's parent cannot be inferred.
pub const DEFAULT_PARENT_ROLE: ParentType = ParentType::Father;

impl ParentRole {
    /// Resolves `Unknown` through [`DEFAULT_PARENT_ROLE`].
    pub fn resolve(self) -> ParentType {
        match self {
            Self::Father => ParentType::Father,
            Self::Mother => ParentType::Mother,
            Self::Unknown => DEFAULT_PARENT_ROLE,
        }
    }
}

/// Infers whether `parent` acts as father or mother.
///
/// Evidence is only consulted for a parent with a recorded spouse. A child
/// listing the parent as mother wins over one listing it as father.
pub fn infer_parent_role(parent: &Person, children: &[Person]) -> ParentRole {
    if parent.spouse_id.is_none() {
        return ParentRole::Unknown;
    }
    let id = Some(parent.id.as_str());
    if children.iter().any(|child| child.mother_id.as_deref() == id) {
        ParentRole::Mother
    } else if children.iter().any(|child| child.father_id.as_deref() == id) {
        ParentRole::Father
    } else {
        ParentRole::Unknown
    }
}

/// Store state the planner reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// The existing person named by the intent.
    pub related: Person,
    /// Everyone listing the related person as a parent (spouse/child intents).
    pub children: Vec<Person>,
    /// The related person's siblings through the parent that is not being
    /// set (parent intent).
    pub other_parent_children: Vec<Person>,
}

impl LinkSnapshot {
    pub fn of(related: Person) -> Self {
        Self {
            related,
            children: Vec::new(),
            other_parent_children: Vec::new(),
        }
    }

    /// Reads what `intent` needs. `Ok(None)` when the related person is gone.
    pub fn gather<R: PersonRepository>(
        repo: &R,
        intent: &RelationshipIntent,
    ) -> RepoResult<Option<Self>> {
        let Some(related) = repo.get_person(&intent.related_person_id)? else {
            return Ok(None);
        };
        let mut snapshot = Self::of(related);

        match intent.relationship_type {
            RelationshipType::Spouse | RelationshipType::Child => {
                snapshot.children = repo.find_people(&PersonFilter::children_of(
                    snapshot.related.id.clone(),
                ))?;
            }
            RelationshipType::Parent => {
                let filter = match intent.parent_type {
                    Some(ParentType::Father) => {
                        snapshot.related.mother_id.clone().map(PersonFilter::with_mother)
                    }
                    Some(ParentType::Mother) => {
                        snapshot.related.father_id.clone().map(PersonFilter::with_father)
                    }
                    None => None,
                };
                if let Some(filter) = filter {
                    snapshot.other_parent_children =
                        repo.find_people(&filter.excluding(snapshot.related.id.clone()))?;
                }
            }
            RelationshipType::Sibling => {}
        }

        Ok(Some(snapshot))
    }
}

/// Why a mutation was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkReason {
    /// Related person gains the new person as spouse.
    SpouseOfRelated,
    /// New person gains the related person as spouse.
    SpouseOfNew,
    /// A child of the related person gains the new spouse as other parent.
    SharedChild,
    /// New child gets the related person as parent.
    ParentOfNew,
    /// New child gets the related person's spouse as the other parent.
    OtherParentOfNew,
    /// New sibling copies the related person's father.
    SharedFather,
    /// New sibling copies the related person's mother.
    SharedMother,
    /// Related person gains the new person as parent.
    ParentOfRelated,
    /// A sibling of the related person gains the new person as parent.
    SharedSibling,
}

impl LinkReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpouseOfRelated => "spouse_of_related",
            Self::SpouseOfNew => "spouse_of_new",
            Self::SharedChild => "shared_child",
            Self::ParentOfNew => "parent_of_new",
            Self::OtherParentOfNew => "other_parent_of_new",
            Self::SharedFather => "shared_father",
            Self::SharedMother => "shared_mother",
            Self::ParentOfRelated => "parent_of_related",
            Self::SharedSibling => "shared_sibling",
        }
    }
}

/// One planned reference update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMutation {
    pub target_id: PersonId,
    pub patch: PersonPatch,
    pub reason: LinkReason,
}

impl LinkMutation {
    fn new(target_id: impl Into<PersonId>, patch: PersonPatch, reason: LinkReason) -> Self {
        Self {
            target_id: target_id.into(),
            patch,
            reason,
        }
    }
}

#[derive(Debug)]
pub struct FailedMutation {
    pub mutation: LinkMutation,
    pub error: RepoError,
}

/// Outcome of applying a mutation plan.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub applied: Vec<LinkMutation>,
    pub failed: Vec<FailedMutation>,
}

impl LinkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Computes the ordered mutations implied by linking `new_person`.
pub fn plan_links(
    new_person: &Person,
    intent: &RelationshipIntent,
    snapshot: &LinkSnapshot,
) -> Vec<LinkMutation> {
    match intent.relationship_type {
        RelationshipType::Spouse => plan_spouse(new_person, intent, snapshot),
        RelationshipType::Child => plan_child(new_person, intent, snapshot),
        RelationshipType::Sibling => plan_sibling(new_person, intent, snapshot),
        RelationshipType::Parent => plan_parent(new_person, intent, snapshot),
    }
}

fn plan_spouse(
    new_person: &Person,
    intent: &RelationshipIntent,
    snapshot: &LinkSnapshot,
) -> Vec<LinkMutation> {
    let related = &snapshot.related;
    let spouse_patch = |id: &str| {
        PersonPatch::set_spouse(
            id,
            new_person.marriage_date.clone(),
            new_person.marriage_date_hebrew.clone(),
        )
    };

    let mut plan = vec![
        LinkMutation::new(
            related.id.as_str(),
            spouse_patch(&new_person.id),
            LinkReason::SpouseOfRelated,
        ),
        LinkMutation::new(
            new_person.id.as_str(),
            spouse_patch(&related.id),
            LinkReason::SpouseOfNew,
        ),
    ];

    // Children are only shared with a first recorded spouse.
    if related.spouse_id.is_some() {
        return plan;
    }

    for child in &snapshot.children {
        if !intent.selected.shares_child(&child.id) {
            continue;
        }
        let is_father = child.father_id.as_deref() == Some(related.id.as_str());
        let is_mother = child.mother_id.as_deref() == Some(related.id.as_str());
        let patch = if is_father && child.mother_id.is_none() {
            PersonPatch::set_mother(new_person.id.as_str())
        } else if is_mother && child.father_id.is_none() {
            PersonPatch::set_father(new_person.id.as_str())
        } else {
            continue;
        };
        plan.push(LinkMutation::new(
            child.id.as_str(),
            patch,
            LinkReason::SharedChild,
        ));
    }

    plan
}

fn plan_child(
    new_person: &Person,
    intent: &RelationshipIntent,
    snapshot: &LinkSnapshot,
) -> Vec<LinkMutation> {
    let related = &snapshot.related;
    let role = infer_parent_role(related, &snapshot.children).resolve();

    let (parent_patch, other_slot) = match role {
        ParentType::Father => (PersonPatch::set_father(related.id.as_str()), ParentType::Mother),
        ParentType::Mother => (PersonPatch::set_mother(related.id.as_str()), ParentType::Father),
    };
    let mut plan = vec![LinkMutation::new(
        new_person.id.as_str(),
        parent_patch,
        LinkReason::ParentOfNew,
    )];

    if intent.selected.share_other_parent {
        if let Some(spouse_id) = &related.spouse_id {
            let patch = match other_slot {
                ParentType::Father => PersonPatch::set_father(spouse_id.as_str()),
                ParentType::Mother => PersonPatch::set_mother(spouse_id.as_str()),
            };
            plan.push(LinkMutation::new(
                new_person.id.as_str(),
                patch,
                LinkReason::OtherParentOfNew,
            ));
        }
    }

    plan
}

fn plan_sibling(
    new_person: &Person,
    intent: &RelationshipIntent,
    snapshot: &LinkSnapshot,
) -> Vec<LinkMutation> {
    let related = &snapshot.related;
    let mut plan = Vec::new();

    if intent.selected.share_father {
        if let Some(father_id) = &related.father_id {
            plan.push(LinkMutation::new(
                new_person.id.as_str(),
                PersonPatch::set_father(father_id.as_str()),
                LinkReason::SharedFather,
            ));
        }
    }
    if intent.selected.share_mother {
        if let Some(mother_id) = &related.mother_id {
            plan.push(LinkMutation::new(
                new_person.id.as_str(),
                PersonPatch::set_mother(mother_id.as_str()),
                LinkReason::SharedMother,
            ));
        }
    }

    plan
}

fn plan_parent(
    new_person: &Person,
    intent: &RelationshipIntent,
    snapshot: &LinkSnapshot,
) -> Vec<LinkMutation> {
    let Some(parent_type) = intent.parent_type else {
        return Vec::new();
    };
    let set_parent = || match parent_type {
        ParentType::Father => PersonPatch::set_father(new_person.id.as_str()),
        ParentType::Mother => PersonPatch::set_mother(new_person.id.as_str()),
    };

    let mut plan = vec![LinkMutation::new(
        snapshot.related.id.as_str(),
        set_parent(),
        LinkReason::ParentOfRelated,
    )];
    plan.extend(
        snapshot
            .other_parent_children
            .iter()
            .filter(|sibling| sibling.id != snapshot.related.id)
            .filter(|sibling| intent.selected.shares_sibling(&sibling.id))
            .map(|sibling| {
                LinkMutation::new(
                    sibling.id.as_str(),
                    set_parent(),
                    LinkReason::SharedSibling,
                )
            }),
    );
    plan
}

/// Applies `plan` in order, collecting failures instead of stopping.
pub fn apply_links<R: PersonRepository>(repo: &R, plan: Vec<LinkMutation>) -> LinkReport {
    let mut report = LinkReport::default();
    for mutation in plan {
        match repo.patch_person(&mutation.target_id, &mutation.patch) {
            Ok(()) => report.applied.push(mutation),
            Err(error) => {
                warn!(
                    "event=link_apply module=linking status=error target_id={} reason={} error={error}",
                    mutation.target_id,
                    mutation.reason.as_str()
                );
                report.failed.push(FailedMutation { mutation, error });
            }
        }
    }
    report
}

/// Gathers, plans and applies links for `new_person`.
///
/// Returns `Ok(None)` when the related person does not exist or the intent
/// is incomplete; the new person then stays unlinked.
pub fn link_new_person<R: PersonRepository>(
    repo: &R,
    new_person: &Person,
    intent: &RelationshipIntent,
) -> RepoResult<Option<LinkReport>> {
    if intent.relationship_type == RelationshipType::Parent && intent.parent_type.is_none() {
        debug!(
            "event=link_skip module=linking reason=missing_parent_type person_id={}",
            new_person.id
        );
        return Ok(None);
    }

    let Some(snapshot) = LinkSnapshot::gather(repo, intent)? else {
        debug!(
            "event=link_skip module=linking reason=related_missing person_id={} related_id={}",
            new_person.id, intent.related_person_id
        );
        return Ok(None);
    };

    let plan = plan_links(new_person, intent, &snapshot);
    let planned = plan.len();
    let report = apply_links(repo, plan);
    debug!(
        "event=link_apply module=linking status={} type={} person_id={} planned={planned} failed={}",
        if report.is_complete() { "ok" } else { "partial" },
        intent.relationship_type.as_str(),
        new_person.id,
        report.failed.len()
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::{
        infer_parent_role, plan_links, LinkReason, LinkSnapshot, ParentRole, ParentType,
        RelationshipIntent, RelationshipType, SelectedRelationships, DEFAULT_PARENT_ROLE,
    };
    use crate::model::person::{Person, PersonPatch};

    fn person(id: &str) -> Person {
        Person::new(id, "First", id)
    }

    fn selection_with_children(entries: &[(&str, bool)]) -> SelectedRelationships {
        SelectedRelationships {
            shared_children: entries
                .iter()
                .map(|(id, flag)| (id.to_string(), *flag))
                .collect(),
            ..SelectedRelationships::default()
        }
    }

    #[test]
    fn omitted_selection_defaults_to_sharing_parents() {
        let intent: RelationshipIntent = serde_json::from_str(
            r#"{"relationshipType": "sibling", "relatedPersonId": "7"}"#,
        )
        .unwrap();
        assert!(intent.selected.share_father);
        assert!(intent.selected.share_mother);
        assert!(intent.selected.share_other_parent);
        assert!(intent.selected.shared_children.is_empty());

        let partial: RelationshipIntent = serde_json::from_str(
            r#"{"relationshipType": "sibling", "relatedPersonId": "7",
                "selectedRelationships": {"shareMother": true}}"#,
        )
        .unwrap();
        assert!(!partial.selected.share_father);
        assert!(partial.selected.share_mother);
    }

    #[test]
    fn parent_role_needs_a_spouse_for_evidence() {
        let mut parent = person("p");
        let mut child = person("c");
        child.mother_id = Some("p".to_string());

        assert_eq!(infer_parent_role(&parent, &[child.clone()]), ParentRole::Unknown);

        parent.spouse_id = Some("s".to_string());
        assert_eq!(infer_parent_role(&parent, &[child.clone()]), ParentRole::Mother);

        child.mother_id = None;
        child.father_id = Some("p".to_string());
        assert_eq!(infer_parent_role(&parent, &[child]), ParentRole::Father);
        assert_eq!(infer_parent_role(&parent, &[]), ParentRole::Unknown);
    }

    #[test]
    fn unknown_role_resolves_to_default_policy() {
        assert_eq!(ParentRole::Unknown.resolve(), DEFAULT_PARENT_ROLE);
        assert_eq!(DEFAULT_PARENT_ROLE, ParentType::Father);
        assert_eq!(ParentRole::Mother.resolve(), ParentType::Mother);
    }

    #[test]
    fn spouse_plan_links_both_sides_then_shared_children() {
        let mut new_spouse = person("D");
        new_spouse.marriage_date = Some("01/06/2010".to_string());
        let mut f = person("F");
        f.father_id = Some("E".to_string());
        let mut g = person("G");
        g.mother_id = Some("E".to_string());

        let snapshot = LinkSnapshot {
            children: vec![f, g],
            ..LinkSnapshot::of(person("E"))
        };
        let intent = RelationshipIntent::new(RelationshipType::Spouse, "E")
            .with_selection(selection_with_children(&[("F", true), ("G", false)]));

        let plan = plan_links(&new_spouse, &intent, &snapshot);
        let targets = plan
            .iter()
            .map(|m| (m.target_id.as_str(), m.reason))
            .collect::<Vec<_>>();
        assert_eq!(
            targets,
            vec![
                ("E", LinkReason::SpouseOfRelated),
                ("D", LinkReason::SpouseOfNew),
                ("F", LinkReason::SharedChild),
            ]
        );
        assert_eq!(
            plan[0].patch,
            PersonPatch::set_spouse("D", Some("01/06/2010".to_string()), None)
        );
        assert_eq!(plan[2].patch, PersonPatch::set_mother("D"));
    }

    #[test]
    fn spouse_plan_skips_children_when_related_was_married() {
        let mut related = person("E");
        related.spouse_id = Some("old".to_string());
        let mut f = person("F");
        f.father_id = Some("E".to_string());

        let snapshot = LinkSnapshot {
            children: vec![f],
            ..LinkSnapshot::of(related)
        };
        let intent = RelationshipIntent::new(RelationshipType::Spouse, "E")
            .with_selection(selection_with_children(&[("F", true)]));

        assert_eq!(plan_links(&person("D"), &intent, &snapshot).len(), 2);
    }

    #[test]
    fn spouse_plan_leaves_filled_parent_slots() {
        let mut f = person("F");
        f.father_id = Some("E".to_string());
        f.mother_id = Some("X".to_string());

        let snapshot = LinkSnapshot {
            children: vec![f],
            ..LinkSnapshot::of(person("E"))
        };
        let intent = RelationshipIntent::new(RelationshipType::Spouse, "E")
            .with_selection(selection_with_children(&[("F", true)]));

        assert_eq!(plan_links(&person("D"), &intent, &snapshot).len(), 2);
    }

    #[test]
    fn child_plan_uses_inferred_role_and_other_parent() {
        let mut related = person("M");
        related.spouse_id = Some("S".to_string());
        let mut older = person("O");
        older.mother_id = Some("M".to_string());

        let snapshot = LinkSnapshot {
            children: vec![older],
            ..LinkSnapshot::of(related)
        };
        let intent = RelationshipIntent::new(RelationshipType::Child, "M");
        let plan = plan_links(&person("N"), &intent, &snapshot);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].patch, PersonPatch::set_mother("M"));
        assert_eq!(plan[1].patch, PersonPatch::set_father("S"));

        let mut no_share = intent.clone();
        no_share.selected.share_other_parent = false;
        assert_eq!(plan_links(&person("N"), &no_share, &snapshot).len(), 1);
    }

    #[test]
    fn child_of_unmarried_parent_defaults_to_father_slot() {
        let snapshot = LinkSnapshot::of(person("R"));
        let intent = RelationshipIntent::new(RelationshipType::Child, "R");
        let plan = plan_links(&person("N"), &intent, &snapshot);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].patch, PersonPatch::set_father("R"));
    }

    #[test]
    fn sibling_plan_copies_selected_parents_independently() {
        let mut related = person("R");
        related.father_id = Some("F".to_string());
        related.mother_id = Some("M".to_string());
        let snapshot = LinkSnapshot::of(related);

        let intent = RelationshipIntent::new(RelationshipType::Sibling, "R");
        let both = plan_links(&person("N"), &intent, &snapshot);
        assert_eq!(both.len(), 2);

        let mother_only = intent.with_selection(SelectedRelationships {
            share_father: false,
            ..SelectedRelationships::default()
        });
        let plan = plan_links(&person("N"), &mother_only, &snapshot);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].patch, PersonPatch::set_mother("M"));
        assert_eq!(plan[0].reason, LinkReason::SharedMother);
    }

    #[test]
    fn parent_plan_fans_out_to_opted_in_siblings() {
        let mut related = person("100");
        related.mother_id = Some("M".to_string());
        let mut c = person("C");
        c.mother_id = Some("M".to_string());
        let mut d = person("D");
        d.mother_id = Some("M".to_string());

        let snapshot = LinkSnapshot {
            other_parent_children: vec![c, d],
            ..LinkSnapshot::of(related)
        };
        let intent = RelationshipIntent::new(RelationshipType::Parent, "100")
            .with_parent_type(ParentType::Father)
            .with_selection(SelectedRelationships {
                shared_siblings: [("C".to_string(), true)].into_iter().collect(),
                ..SelectedRelationships::default()
            });

        let plan = plan_links(&person("B"), &intent, &snapshot);
        let targets = plan.iter().map(|m| m.target_id.as_str()).collect::<Vec<_>>();
        assert_eq!(targets, vec!["100", "C"]);
        assert!(plan.iter().all(|m| m.patch == PersonPatch::set_father("B")));
    }

    #[test]
    fn parent_plan_without_type_is_empty() {
        let snapshot = LinkSnapshot::of(person("100"));
        let intent = RelationshipIntent::new(RelationshipType::Parent, "100");
        assert!(plan_links(&person("B"), &intent, &snapshot).is_empty());
    }
}
