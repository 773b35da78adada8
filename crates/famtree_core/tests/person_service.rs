use famtree_core::db::open_db_in_memory;
use famtree_core::{
    IdGenerator, NewPerson, ParentType, Person, PersonFilter, PersonId, PersonPatch,
    PersonRepository, PersonService, ProximityContext, RelationshipIntent, RelationshipType,
    RepoError, RepoResult, SelectedRelationships, ServiceError, SqlitePersonRepository,
};
use std::cell::Cell;
use std::collections::HashMap;

/// Hands out "1", "2", ... in order.
#[derive(Default)]
struct SequentialIds {
    next: Cell<u32>,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> PersonId {
        let id = self.next.get() + 1;
        self.next.set(id);
        id.to_string()
    }
}

struct FixedId(&'static str);

impl IdGenerator for FixedId {
    fn next_id(&self) -> PersonId {
        self.0.to_string()
    }
}

/// Delegates to an inner store, failing selected operations.
struct FaultyRepo<R> {
    inner: R,
    fail_patch_for: Option<&'static str>,
    fail_find: bool,
    /// Fails reads of this id once the inner store holds it.
    fail_reread_of: Option<&'static str>,
}

impl<R> FaultyRepo<R> {
    fn failing_patch(inner: R, target_id: &'static str) -> Self {
        Self {
            inner,
            fail_patch_for: Some(target_id),
            fail_find: false,
            fail_reread_of: None,
        }
    }

    fn failing_find(inner: R) -> Self {
        Self {
            inner,
            fail_patch_for: None,
            fail_find: true,
            fail_reread_of: None,
        }
    }

    fn failing_reread(inner: R, target_id: &'static str) -> Self {
        Self {
            inner,
            fail_patch_for: None,
            fail_find: false,
            fail_reread_of: Some(target_id),
        }
    }
}

impl<R: PersonRepository> PersonRepository for FaultyRepo<R> {
    fn insert_person(&self, person: &Person) -> RepoResult<()> {
        self.inner.insert_person(person)
    }

    fn get_person(&self, id: &str) -> RepoResult<Option<Person>> {
        let stored = self.inner.get_person(id)?;
        if self.fail_reread_of == Some(id) && stored.is_some() {
            return Err(RepoError::InvalidData(format!("read of {id} rejected")));
        }
        Ok(stored)
    }

    fn find_people(&self, filter: &PersonFilter) -> RepoResult<Vec<Person>> {
        if self.fail_find {
            return Err(RepoError::InvalidData("store unavailable".to_string()));
        }
        self.inner.find_people(filter)
    }

    fn patch_person(&self, id: &str, patch: &PersonPatch) -> RepoResult<()> {
        if self.fail_patch_for == Some(id) {
            return Err(RepoError::InvalidData(format!("write to {id} rejected")));
        }
        self.inner.patch_person(id, patch)
    }

    fn delete_person(&self, id: &str) -> RepoResult<()> {
        self.inner.delete_person(id)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.inner.delete_all()
    }
}

fn seed(repo: &impl PersonRepository, id: &str, father: Option<&str>, mother: Option<&str>) {
    let mut person = Person::new(id, "Seed", id);
    person.father_id = father.map(str::to_string);
    person.mother_id = mother.map(str::to_string);
    repo.insert_person(&person).unwrap();
}

fn load(repo: &impl PersonRepository, id: &str) -> Person {
    repo.get_person(id).unwrap().unwrap()
}

fn flags(entries: &[(&str, bool)]) -> HashMap<PersonId, bool> {
    entries
        .iter()
        .map(|(id, flag)| (id.to_string(), *flag))
        .collect()
}

#[test]
fn parent_intent_sets_parent_and_opted_in_siblings() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "100", None, Some("M"));
    seed(&repo, "C", None, Some("M"));
    seed(&repo, "D", None, Some("M"));

    let service = PersonService::new(&repo, FixedId("B"));
    let intent = RelationshipIntent::new(RelationshipType::Parent, "100")
        .with_parent_type(ParentType::Father)
        .with_selection(SelectedRelationships {
            shared_siblings: flags(&[("C", true)]),
            ..SelectedRelationships::default()
        });
    let created = service
        .create_person(NewPerson::named("Baruch", "Levi"), Some(&intent))
        .unwrap();

    assert_eq!(created.id, "B");
    assert_eq!(load(&repo, "100").father_id.as_deref(), Some("B"));
    assert_eq!(load(&repo, "C").father_id.as_deref(), Some("B"));
    assert_eq!(load(&repo, "D").father_id, None);
}

#[test]
fn parent_intent_without_type_only_creates_person() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "100", None, None);

    let service = PersonService::new(&repo, FixedId("B"));
    let intent = RelationshipIntent::new(RelationshipType::Parent, "100");
    service
        .create_person(NewPerson::named("B", "B"), Some(&intent))
        .unwrap();

    assert!(repo.exists("B").unwrap());
    assert_eq!(load(&repo, "100").father_id, None);
    assert_eq!(load(&repo, "100").mother_id, None);
}

#[test]
fn spouse_intent_links_both_ways_and_shares_selected_children() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "E", None, None);
    seed(&repo, "F", Some("E"), None);
    seed(&repo, "G", None, Some("E"));

    let service = PersonService::new(&repo, FixedId("D"));
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "E").with_selection(
        SelectedRelationships {
            shared_children: flags(&[("F", true), ("G", false)]),
            ..SelectedRelationships::default()
        },
    );
    let mut input = NewPerson::named("Dina", "Levi");
    input.marriage_date = Some("2010-06-01".to_string());
    let created = service.create_person(input, Some(&intent)).unwrap();

    assert_eq!(created.spouse_id.as_deref(), Some("E"));
    let e = load(&repo, "E");
    assert_eq!(e.spouse_id.as_deref(), Some("D"));
    assert_eq!(e.marriage_date.as_deref(), Some("01/06/2010"));
    assert_eq!(load(&repo, "F").mother_id.as_deref(), Some("D"));
    assert_eq!(load(&repo, "G").father_id, None);

    let graph = service.list_with_relations().unwrap();
    let d = graph.iter().find(|p| p.id() == "D").unwrap();
    let e = graph.iter().find(|p| p.id() == "E").unwrap();
    assert_eq!(d.spouse.as_ref().unwrap().id, "E");
    assert_eq!(e.spouse.as_ref().unwrap().id, "D");
    assert_eq!(
        d.children.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec!["F"]
    );
}

#[test]
fn spouse_intent_keeps_children_of_previous_marriage() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let mut e = Person::new("E", "Eli", "Cohen");
    e.spouse_id = Some("X".to_string());
    repo.insert_person(&e).unwrap();
    seed(&repo, "F", Some("E"), None);

    let service = PersonService::new(&repo, FixedId("D"));
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "E").with_selection(
        SelectedRelationships {
            shared_children: flags(&[("F", true)]),
            ..SelectedRelationships::default()
        },
    );
    service
        .create_person(NewPerson::named("Dina", "Levi"), Some(&intent))
        .unwrap();

    assert_eq!(load(&repo, "E").spouse_id.as_deref(), Some("D"));
    assert_eq!(load(&repo, "F").mother_id, None);
}

#[test]
fn child_intent_infers_role_and_shares_other_parent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let mut r = Person::new("R", "Rachel", "Cohen");
    r.spouse_id = Some("S".to_string());
    repo.insert_person(&r).unwrap();
    seed(&repo, "S", None, None);
    seed(&repo, "older", Some("S"), Some("R"));

    let service = PersonService::new(&repo, FixedId("N"));
    let intent = RelationshipIntent::new(RelationshipType::Child, "R");
    let created = service
        .create_person(NewPerson::named("Noa", "Cohen"), Some(&intent))
        .unwrap();

    assert_eq!(created.mother_id.as_deref(), Some("R"));
    assert_eq!(created.father_id.as_deref(), Some("S"));

    let graph = service.list_with_relations().unwrap();
    let noa = graph.iter().find(|p| p.id() == "N").unwrap();
    let sibling = noa.sibling("older").unwrap();
    assert!(!sibling.is_half_sibling);
}

#[test]
fn child_of_unmarried_parent_uses_father_slot() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "R", None, None);

    let service = PersonService::new(&repo, FixedId("N"));
    let intent = RelationshipIntent::new(RelationshipType::Child, "R");
    let created = service
        .create_person(NewPerson::named("Noa", "Cohen"), Some(&intent))
        .unwrap();

    assert_eq!(created.father_id.as_deref(), Some("R"));
    assert_eq!(created.mother_id, None);
}

#[test]
fn sibling_intent_copies_selected_parents() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "R", Some("F"), Some("M"));

    let service = PersonService::new(&repo, SequentialIds::default());
    let intent = RelationshipIntent::new(RelationshipType::Sibling, "R").with_selection(
        SelectedRelationships {
            share_father: false,
            ..SelectedRelationships::default()
        },
    );
    let created = service
        .create_person(NewPerson::named("Half", "Sib"), Some(&intent))
        .unwrap();

    assert_eq!(created.father_id, None);
    assert_eq!(created.mother_id.as_deref(), Some("M"));
}

#[test]
fn missing_related_person_leaves_new_person_unlinked() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let service = PersonService::new(&repo, SequentialIds::default());
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "nobody");
    let created = service
        .create_person(NewPerson::named("Solo", "Person"), Some(&intent))
        .unwrap();

    assert_eq!(created.spouse_id, None);
    assert_eq!(repo.list_people().unwrap().len(), 1);
}

#[test]
fn failed_fanout_write_is_reported_and_others_still_apply() {
    let conn = open_db_in_memory().unwrap();
    let inner = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&inner, "E", None, None);
    seed(&inner, "F", Some("E"), None);
    seed(&inner, "G", Some("E"), None);

    let repo = FaultyRepo::failing_patch(&inner, "F");
    let service = PersonService::new(&repo, FixedId("D"));
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "E").with_selection(
        SelectedRelationships {
            shared_children: flags(&[("F", true), ("G", true)]),
            ..SelectedRelationships::default()
        },
    );

    match service.create_person(NewPerson::named("Dina", "Levi"), Some(&intent)) {
        Err(ServiceError::PartialFanout {
            person_id,
            applied,
            failed,
        }) => {
            assert_eq!(person_id, "D");
            assert_eq!(applied, 3);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].mutation.target_id, "F");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(inner.exists("D").unwrap());
    assert_eq!(load(&inner, "E").spouse_id.as_deref(), Some("D"));
    assert_eq!(load(&inner, "F").mother_id, None);
    assert_eq!(load(&inner, "G").mother_id.as_deref(), Some("D"));
}

#[test]
fn unreadable_relatives_report_snapshot_failure() {
    let conn = open_db_in_memory().unwrap();
    let inner = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&inner, "E", None, None);

    let repo = FaultyRepo::failing_find(&inner);
    let service = PersonService::new(&repo, FixedId("D"));
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "E");

    match service.create_person(NewPerson::named("Dina", "Levi"), Some(&intent)) {
        Err(ServiceError::LinkSnapshot { person_id, .. }) => assert_eq!(person_id, "D"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(inner.exists("D").unwrap());
    assert_eq!(load(&inner, "E").spouse_id, None);
}

#[test]
fn colliding_ids_are_retried_then_exhausted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "1", None, None);

    let service = PersonService::new(&repo, SequentialIds::default());
    let created = service
        .create_person(NewPerson::named("Second", "Person"), None)
        .unwrap();
    assert_eq!(created.id, "2");

    let stuck = PersonService::new(&repo, FixedId("1"));
    assert!(matches!(
        stuck.create_person(NewPerson::named("Third", "Person"), None),
        Err(ServiceError::IdExhausted { .. })
    ));
}

#[test]
fn update_get_and_delete_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let service = PersonService::new(&repo, SequentialIds::default());

    let created = service
        .create_person(NewPerson::named("Avi", "Mizrahi"), None)
        .unwrap();
    let updated = service
        .update_person(
            &created.id,
            &PersonPatch {
                email: Some(Some("avi@example.com".to_string())),
                ..PersonPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.email.as_deref(), Some("avi@example.com"));
    assert_eq!(service.get_person(&created.id).unwrap(), updated);

    service.delete_person(&created.id).unwrap();
    assert!(matches!(
        service.get_person(&created.id),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_person(&created.id),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.update_person("ghost", &PersonPatch::set_father("1")),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn hidden_people_drop_out_of_derived_views() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&repo, "F", None, None);
    seed(&repo, "c", Some("F"), None);

    let service = PersonService::new(&repo, SequentialIds::default());
    service
        .update_person(
            "F",
            &PersonPatch {
                hidden: Some(true),
                ..PersonPatch::default()
            },
        )
        .unwrap();

    let graph = service.list_with_relations().unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph[0].father, None);
    assert!(matches!(
        service.get_with_relations("F"),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn upcoming_dates_read_through_service() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let service = PersonService::new(&repo, SequentialIds::default());

    let mut input = NewPerson::named("Tal", "Peretz");
    input.birth_date_gregorian = Some("1990-03-15".to_string());
    input.notify_on_birthday = true;
    service.create_person(input, None).unwrap();

    let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 20)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let upcoming = service.upcoming_dates(&ProximityContext::new(now)).unwrap();
    assert_eq!(upcoming.birthdays.len(), 1);
    assert_eq!(upcoming.birthdays[0].date, "15/03/1990");
    assert_eq!(upcoming.birthdays[0].days_until, 360);
}

#[test]
fn failed_reread_after_linking_returns_created_person() {
    let conn = open_db_in_memory().unwrap();
    let inner = SqlitePersonRepository::try_new(&conn).unwrap();
    seed(&inner, "E", None, None);

    let repo = FaultyRepo::failing_reread(&inner, "D");
    let service = PersonService::new(&repo, FixedId("D"));
    let intent = RelationshipIntent::new(RelationshipType::Spouse, "E");

    let created = service
        .create_person(NewPerson::named("Dina", "Levi"), Some(&intent))
        .unwrap();
    assert_eq!(created.id, "D");
    assert_eq!(created.first_name, "Dina");
    assert_eq!(load(&inner, "D").spouse_id.as_deref(), Some("E"));
    assert_eq!(load(&inner, "E").spouse_id.as_deref(), Some("D"));
}

#[test]
fn updated_iso_dates_count_down_like_created_ones() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let service = PersonService::new(&repo, SequentialIds::default());

    let mut input = NewPerson::named("Gil", "Amar");
    input.notify_on_birthday = true;
    let created = service.create_person(input, None).unwrap();

    let patch: PersonPatch = serde_json::from_str(
        r#"{"birthDateGregorian": "1990-03-22", "deathDateGregorian": "2020-1-5", "marriageDate": " 2012-06-01 "}"#,
    )
    .unwrap();
    let updated = service.update_person(&created.id, &patch).unwrap();
    assert_eq!(updated.birth_date_gregorian.as_deref(), Some("22/03/1990"));
    assert_eq!(updated.death_date_gregorian.as_deref(), Some("05/01/2020"));
    assert_eq!(updated.marriage_date.as_deref(), Some("01/06/2012"));

    let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 20)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let upcoming = service.upcoming_dates(&ProximityContext::new(now)).unwrap();
    assert_eq!(upcoming.birthdays.len(), 1);
    assert_eq!(upcoming.birthdays[0].days_until, 2);
}

#[test]
fn delete_all_empties_the_store() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let service = PersonService::new(&repo, SequentialIds::default());
    for name in ["Ori", "Yael", "Eden"] {
        service
            .create_person(NewPerson::named(name, "Katz"), None)
            .unwrap();
    }

    assert_eq!(service.delete_all().unwrap(), 3);
    assert!(service.list_with_relations().unwrap().is_empty());
    assert_eq!(service.delete_all().unwrap(), 0);
}

#[test]
fn search_skips_hidden_people_and_blank_terms() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let service = PersonService::new(&repo, SequentialIds::default());

    let mut noa = NewPerson::named("Noa", "Friedman");
    noa.phone = Some("052-7654321".to_string());
    let noa = service.create_person(noa, None).unwrap();
    let mut nadav = NewPerson::named("Nadav", "Fried");
    nadav.email = Some("NADAV@mail.test".to_string());
    let nadav = service.create_person(nadav, None).unwrap();
    let hidden = service
        .create_person(NewPerson::named("Noam", "Friedland"), None)
        .unwrap();
    service
        .update_person(
            &hidden.id,
            &PersonPatch {
                hidden: Some(true),
                ..PersonPatch::default()
            },
        )
        .unwrap();

    let ids = |term: &str| {
        service
            .search(term)
            .unwrap()
            .into_iter()
            .map(|entry| entry.person.id)
            .collect::<Vec<_>>()
    };
    assert_eq!(ids("  FRIED "), vec![noa.id.clone(), nadav.id.clone()]);
    assert_eq!(ids("noa friedman"), vec![noa.id.clone()]);
    assert_eq!(ids("@mail"), vec![nadav.id.clone()]);
    assert_eq!(ids("7654"), vec![noa.id.clone()]);
    assert!(ids("   ").is_empty());
    assert!(ids("noam").is_empty());
}
