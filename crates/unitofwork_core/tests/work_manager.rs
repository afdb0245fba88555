mod common;

use common::CampusContext;
use unitofwork_core::{DbConfig, SchoolContext, Student, UnitOfWork, WorkManager};

#[test]
fn same_context_kind_yields_the_same_unit_of_work() {
    let mut manager = WorkManager::new();

    let first: *const UnitOfWork<SchoolContext> = manager.unit_of_work::<SchoolContext>().unwrap();
    manager
        .unit_of_work::<SchoolContext>()
        .unwrap()
        .generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Ann", 20))
        .unwrap();
    let second: *const UnitOfWork<SchoolContext> = manager.unit_of_work::<SchoolContext>().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        manager.unit_of_work::<SchoolContext>().unwrap().pending_changes(),
        1
    );
    assert_eq!(manager.len(), 1);
}

#[test]
fn different_context_kinds_yield_distinct_units_of_work() {
    let mut manager = WorkManager::new();

    let school = manager.unit_of_work::<SchoolContext>().unwrap() as *const UnitOfWork<SchoolContext>;
    let campus = manager.unit_of_work::<CampusContext>().unwrap() as *const UnitOfWork<CampusContext>;

    assert_ne!(school.cast::<()>(), campus.cast::<()>());
    assert_eq!(manager.len(), 2);
    assert_eq!(
        manager.unit_of_work::<CampusContext>().unwrap().name(),
        "campus"
    );
}

#[test]
fn configured_file_database_is_used_on_first_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("school.db");

    let mut manager = WorkManager::new();
    manager.configure::<SchoolContext>(DbConfig::file(&path));
    let uow = manager.unit_of_work::<SchoolContext>().unwrap();
    uow.generic_repository::<Student>()
        .unwrap()
        .insert(&mut Student::new("Ann", 20))
        .unwrap();
    uow.save_changes().unwrap();
    manager.dispose();

    let mut reopened = UnitOfWork::<SchoolContext>::open_with(&DbConfig::file(&path)).unwrap();
    assert_eq!(
        reopened.generic_repository::<Student>().unwrap().count().unwrap(),
        1
    );
}

#[test]
fn dispose_disposes_every_unit_of_work_once() {
    let mut manager = WorkManager::new();
    manager.unit_of_work::<SchoolContext>().unwrap();
    manager.unit_of_work::<CampusContext>().unwrap();

    manager.dispose();
    manager.dispose();
    assert!(manager.is_disposed());
    assert!(manager.is_empty());
    assert!(manager.save_changes_all().is_err());
}
