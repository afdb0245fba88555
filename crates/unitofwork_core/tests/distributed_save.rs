mod common;

use common::{campus, school, CampusContext};
use unitofwork_core::{
    save_changes_all, DbError, SchoolContext, Student, TransactionState, TransactionalWork,
    WorkManager,
};

#[test]
fn all_members_commit_when_every_save_succeeds() {
    let mut first = school();
    let mut second = campus();
    first
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Ann", 20))
        .unwrap();
    second
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Bea", 22))
        .unwrap();

    let mut members: [&mut dyn TransactionalWork; 2] = [&mut first, &mut second];
    assert_eq!(save_changes_all(&mut members).unwrap(), 2);

    assert_eq!(first.transaction_state(), TransactionState::Open);
    assert_eq!(first.generic_repository::<Student>().unwrap().count().unwrap(), 1);
    assert_eq!(second.generic_repository::<Student>().unwrap().count().unwrap(), 1);
    assert_eq!(first.pending_changes(), 0);
}

#[test]
fn failure_in_second_member_rolls_back_the_first() {
    let mut first = school();
    let mut second = campus();
    let before = first.generic_repository::<Student>().unwrap().count().unwrap();

    first
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Ann", 20))
        .unwrap();
    second
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("", 20))
        .unwrap();

    let mut members: [&mut dyn TransactionalWork; 2] = [&mut first, &mut second];
    let err = save_changes_all(&mut members).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)), "store error is returned as is");

    assert_eq!(first.transaction_state(), TransactionState::Open);
    assert_eq!(second.transaction_state(), TransactionState::Open);
    assert_eq!(
        first.generic_repository::<Student>().unwrap().count().unwrap(),
        before
    );
    assert_eq!(first.pending_changes(), 1, "rolled back changes are staged again");
    assert_eq!(second.pending_changes(), 1);
}

#[test]
fn member_already_in_a_transaction_fails_the_begin_phase() {
    let mut first = school();
    let mut second = campus();
    second.begin_transaction().unwrap();

    let mut members: [&mut dyn TransactionalWork; 2] = [&mut first, &mut second];
    let err = save_changes_all(&mut members).unwrap_err();
    assert!(matches!(err, DbError::TransactionAlreadyActive("campus")));

    assert_eq!(first.transaction_state(), TransactionState::Open);
    assert_eq!(
        second.transaction_state(),
        TransactionState::InTransaction,
        "a transaction the coordinator did not begin is left alone"
    );
}

#[test]
fn work_manager_saves_every_held_unit_of_work() {
    let mut manager = WorkManager::new();
    manager
        .unit_of_work::<SchoolContext>()
        .unwrap()
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Ann", 20))
        .unwrap();
    manager
        .unit_of_work::<CampusContext>()
        .unwrap()
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("", 20))
        .unwrap();

    assert!(manager.save_changes_all().is_err());
    assert_eq!(
        manager
            .unit_of_work::<SchoolContext>()
            .unwrap()
            .generic_repository::<Student>()
            .unwrap()
            .count()
            .unwrap(),
        0
    );
}
