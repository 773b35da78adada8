//! Relationship derivation over a person snapshot.
//!
//! # Invariants
//! - Output order is the first-seen order of visible persons in the input.
//! - Children and sibling lists follow that same scan order.
//! - A person is never listed as their own sibling.
//! - Full siblings share both resolved parents; half siblings share exactly
//!   one and carry which one in `common_parent`.

use crate::model::person::Person;
use crate::model::relations::{
    CommonParent, PersonWithRelations, RelativeSummary, SiblingSummary, SpouseSummary,
};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Derives the annotated relationship view for every visible person.
///
/// A duplicate identifier keeps its first position and its last record.
pub fn derive_relations(people: &[Person]) -> Vec<PersonWithRelations> {
    let lookup = VisibleLookup::build(people);
    let children = ChildIndex::build(&lookup);

    let derived = lookup
        .iter()
        .map(|person| derive_one(person, &lookup, &children))
        .collect::<Vec<_>>();

    debug!(
        "event=graph_derive module=graph status=ok input={} visible={} parents={}",
        people.len(),
        derived.len(),
        children.len()
    );
    derived
}

struct VisibleLookup<'a> {
    by_id: HashMap<&'a str, &'a Person>,
    order: Vec<&'a str>,
}

impl<'a> VisibleLookup<'a> {
    fn build(people: &'a [Person]) -> Self {
        let mut by_id = HashMap::with_capacity(people.len());
        let mut order = Vec::with_capacity(people.len());
        for person in people.iter().filter(|person| !person.hidden) {
            if by_id.insert(person.id.as_str(), person).is_none() {
                order.push(person.id.as_str());
            }
        }
        Self { by_id, order }
    }

    fn get(&self, id: Option<&str>) -> Option<&'a Person> {
        id.and_then(|id| self.by_id.get(id).copied())
    }

    fn iter(&self) -> impl Iterator<Item = &'a Person> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id).copied())
    }
}

/// Parent id -> visible child ids, in scan order.
struct ChildIndex<'a> {
    by_parent: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> ChildIndex<'a> {
    fn build(lookup: &VisibleLookup<'a>) -> Self {
        let mut by_parent: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for person in lookup.iter() {
            let father = lookup.get(person.father_id.as_deref());
            let mother = lookup.get(person.mother_id.as_deref());

            if let Some(father) = father {
                by_parent
                    .entry(father.id.as_str())
                    .or_default()
                    .push(person.id.as_str());
            }
            if let Some(mother) = mother {
                if father.map(|father| father.id == mother.id) != Some(true) {
                    by_parent
                        .entry(mother.id.as_str())
                        .or_default()
                        .push(person.id.as_str());
                }
            }
        }
        Self { by_parent }
    }

    fn of(&self, parent_id: Option<&str>) -> Option<&[&'a str]> {
        parent_id
            .and_then(|id| self.by_parent.get(id))
            .map(Vec::as_slice)
    }

    fn len(&self) -> usize {
        self.by_parent.len()
    }
}

fn derive_one(
    person: &Person,
    lookup: &VisibleLookup<'_>,
    children: &ChildIndex<'_>,
) -> PersonWithRelations {
    let father = lookup
        .get(person.father_id.as_deref())
        .map(RelativeSummary::of);
    let mother = lookup
        .get(person.mother_id.as_deref())
        .map(RelativeSummary::of);
    let spouse = lookup
        .get(person.spouse_id.as_deref())
        .map(|spouse| SpouseSummary {
            id: spouse.id.clone(),
            name: spouse.display_name(),
            marriage_date: person.marriage_date.clone(),
            marriage_date_hebrew: person.marriage_date_hebrew.clone(),
        });

    let own_children = children
        .of(Some(person.id.as_str()))
        .unwrap_or_default()
        .iter()
        .filter_map(|id| lookup.get(Some(*id)))
        .map(RelativeSummary::of)
        .collect();

    PersonWithRelations {
        person: person.clone(),
        father,
        mother,
        spouse,
        children: own_children,
        siblings: classify_siblings(person, lookup, children),
    }
}

fn classify_siblings(
    person: &Person,
    lookup: &VisibleLookup<'_>,
    children: &ChildIndex<'_>,
) -> Vec<SiblingSummary> {
    let self_id = person.id.as_str();
    let father_children = children.of(person.father_id.as_deref());
    let mother_children = children.of(person.mother_id.as_deref());

    let mut siblings = Vec::new();
    let mut push = |id: &str, summary: fn(&Person) -> SiblingSummary| {
        if let Some(sibling) = lookup.get(Some(id)) {
            siblings.push(summary(sibling));
        }
    };

    match (father_children, mother_children) {
        (Some(father_children), Some(mother_children)) => {
            let mother_set: HashSet<&str> = mother_children.iter().copied().collect();
            let full: HashSet<&str> = father_children
                .iter()
                .copied()
                .filter(|id| *id != self_id && mother_set.contains(id))
                .collect();

            for &id in father_children {
                if full.contains(id) {
                    push(id, SiblingSummary::full);
                }
            }
            for &id in mother_children {
                if id != self_id && !full.contains(id) {
                    push(id, |p| SiblingSummary::half(p, CommonParent::Mother));
                }
            }
            for &id in father_children {
                if id != self_id && !full.contains(id) && !mother_set.contains(id) {
                    push(id, |p| SiblingSummary::half(p, CommonParent::Father));
                }
            }
        }
        (Some(father_children), None) => {
            for &id in father_children {
                if id != self_id {
                    push(id, |p| SiblingSummary::half(p, CommonParent::Father));
                }
            }
        }
        (None, Some(mother_children)) => {
            for &id in mother_children {
                if id != self_id {
                    push(id, |p| SiblingSummary::half(p, CommonParent::Mother));
                }
            }
        }
        (None, None) => {}
    }

    siblings
}
