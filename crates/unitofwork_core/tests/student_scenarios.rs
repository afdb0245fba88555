mod common;

use common::school;
use unitofwork_core::pre_action::student_age::{UNDER_18_AGE_CODE, UNDER_18_AGE_MESSAGE};
use unitofwork_core::{
    Operation, PreActionPipeline, QueryOptions, RepoError, Student, StudentAgeGate,
};

fn gated_school() -> unitofwork_core::UnitOfWork<unitofwork_core::SchoolContext> {
    let mut uow = school();
    uow.pre_action(PreActionPipeline::<Student>::new().with(StudentAgeGate))
        .unwrap();
    uow
}

#[test]
fn adult_student_is_inserted_and_found_by_name() {
    let mut uow = gated_school();

    let mut ann = Student::new("Ann", 20);
    uow.generic_repository::<Student>()
        .unwrap()
        .insert(&mut ann)
        .unwrap();
    assert!(ann.validation_results.is_empty());
    assert_eq!(uow.save_changes().unwrap(), 1);

    let mut repo = uow.generic_repository::<Student>().unwrap();
    assert_eq!(repo.count().unwrap(), 1);
    let found = repo
        .get_first_or_default(QueryOptions::new().filter(|student: &Student| student.name == "Ann"))
        .unwrap()
        .unwrap();
    assert_ne!(found.id, 0);
    assert_eq!(found.age, Some(20));
}

#[test]
fn minor_is_rejected_with_under_18_entry_and_count_is_unchanged() {
    let mut uow = gated_school();
    let before = uow.generic_repository::<Student>().unwrap().count().unwrap();

    let mut tom = Student::new("Tom", 15);
    let err = uow
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut tom)
        .unwrap_err();

    assert_eq!(
        tom.validation_results.get(UNDER_18_AGE_CODE),
        Some(UNDER_18_AGE_MESSAGE)
    );
    match &err {
        RepoError::AccessDenied {
            operation,
            entity_type,
            results,
        } => {
            assert_eq!(*operation, Operation::Insert);
            assert_eq!(*entity_type, "students");
            assert_eq!(
                serde_json::to_value(results).unwrap(),
                serde_json::json!({ "Under18Age": "Age can not be under 18" })
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(uow.save_changes().unwrap(), 0);
    assert_eq!(
        uow.generic_repository::<Student>().unwrap().count().unwrap(),
        before
    );
}

#[test]
fn each_admitted_insert_increases_count_by_one() {
    let mut uow = gated_school();

    for (expected, name) in ["Ann", "Bea", "Cid"].into_iter().enumerate() {
        uow.generic_repository::<Student>()
            .unwrap()
            .insert(&mut Student::new(name, 30))
            .unwrap();
        uow.save_changes().unwrap();
        assert_eq!(
            uow.generic_repository::<Student>().unwrap().count().unwrap(),
            expected + 1
        );
    }
}

#[test]
fn find_returns_inserted_entity_and_none_for_missing_key() {
    let mut uow = school();
    common::seed_students(&mut uow, &[("Ann", 20)]);

    let mut repo = uow.generic_repository::<Student>().unwrap();
    let ann = repo.get_all().unwrap().remove(0);

    let found = repo.find(ann.id).unwrap().unwrap();
    assert_eq!(found, ann);
    assert!(repo.find(ann.id + 100).unwrap().is_none());
}

#[test]
fn update_and_delete_flow_through_save_changes() {
    let mut uow = school();
    common::seed_students(&mut uow, &[("Ann", 20), ("Bea", 22)]);

    let mut repo = uow.generic_repository::<Student>().unwrap();
    let mut students = repo.get_all().unwrap();
    students[0].age = Some(21);
    repo.update(&mut students[0]).unwrap();
    assert!(repo.delete_by_key(students[1].id).unwrap());
    assert!(!repo.delete_by_key(9_999).unwrap());
    assert_eq!(uow.save_changes().unwrap(), 2);

    let mut repo = uow.generic_repository::<Student>().unwrap();
    let remaining = repo.get_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Ann");
    assert_eq!(remaining[0].age, Some(21));
}

#[test]
fn find_prefers_tracked_state_and_hides_pending_deletes() {
    let mut uow = school();
    common::seed_students(&mut uow, &[("Ann", 20)]);

    let mut repo = uow.generic_repository::<Student>().unwrap();
    let mut ann = repo.get_all().unwrap().remove(0);
    ann.name = "Anna".to_string();
    repo.update(&mut ann).unwrap();

    assert_eq!(repo.find(ann.id).unwrap().unwrap().name, "Anna");
    assert_eq!(repo.get_all().unwrap()[0].name, "Ann");
    let tracked = repo
        .get_first_or_default(QueryOptions::new().tracking(true))
        .unwrap()
        .unwrap();
    assert_eq!(tracked.name, "Anna");

    repo.delete(&mut ann).unwrap();
    assert!(repo.find(ann.id).unwrap().is_none());
}

#[test]
fn gate_applies_to_updates_and_deletes_as_well() {
    let mut uow = school();
    common::seed_students(&mut uow, &[("Ann", 20)]);
    uow.pre_action(PreActionPipeline::<Student>::new().with(StudentAgeGate))
        .unwrap();

    let mut repo = uow.generic_repository::<Student>().unwrap();
    let mut ann = repo.get_all().unwrap().remove(0);
    ann.age = Some(17);
    let err = repo.update(&mut ann).unwrap_err();
    assert!(matches!(
        err,
        RepoError::AccessDenied {
            operation: Operation::Update,
            ..
        }
    ));

    let err = repo.delete(&mut ann).unwrap_err();
    assert!(err.is_access_denied());
    drop(repo);
    assert_eq!(uow.pending_changes(), 0);
}
