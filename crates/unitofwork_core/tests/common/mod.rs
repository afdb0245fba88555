#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::Serialize;
use unitofwork_core::db::migrations::Migration;
use unitofwork_core::{
    ContextKind, Entity, SchoolContext, Student, UnitOfWork, Validatable, ValidationResults,
};

const CAMPUS_SCHEMA: &str = "
CREATE TABLE students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(name) > 0),
    age INTEGER
);
CREATE TABLE courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL
);
CREATE TABLE enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    student_id INTEGER NOT NULL REFERENCES students(id)
);
";

const CAMPUS_MIGRATIONS: &[Migration] = &[Migration::new(1, CAMPUS_SCHEMA)];

/// Second context kind: students plus courses and enrollments.
pub struct CampusContext;

impl ContextKind for CampusContext {
    const NAME: &'static str = "campus";

    fn migrations() -> &'static [Migration] {
        CAMPUS_MIGRATIONS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub students: Vec<Student>,
    #[serde(skip)]
    pub validation_results: ValidationResults,
}

impl Course {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Validatable for Course {
    fn validation_results(&self) -> &ValidationResults {
        &self.validation_results
    }

    fn validation_results_mut(&mut self) -> &mut ValidationResults {
        &mut self.validation_results
    }
}

impl Entity for Course {
    const TABLE: &'static str = "courses";
    const COLUMNS: &'static [&'static str] = &["title"];
    const NAVIGATIONS: &'static [&'static str] = &["students"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Text(self.title.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            ..Self::default()
        })
    }

    fn include(&mut self, path: &str, conn: &Connection) -> rusqlite::Result<()> {
        if path != "students" {
            return Ok(());
        }
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.age
             FROM students s
             JOIN enrollments e ON e.student_id = s.id
             WHERE e.course_id = ?1
             ORDER BY s.id;",
        )?;
        let mut rows = stmt.query([self.id])?;
        self.students.clear();
        while let Some(row) = rows.next()? {
            self.students.push(Student::from_row(row)?);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrollment {
    pub id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub validation_results: ValidationResults,
}

impl Enrollment {
    pub fn new(course_id: i64, student_id: i64) -> Self {
        Self {
            course_id,
            student_id,
            ..Self::default()
        }
    }
}

impl Validatable for Enrollment {
    fn validation_results(&self) -> &ValidationResults {
        &self.validation_results
    }

    fn validation_results_mut(&mut self) -> &mut ValidationResults {
        &mut self.validation_results
    }
}

impl Entity for Enrollment {
    const TABLE: &'static str = "enrollments";
    const COLUMNS: &'static [&'static str] = &["course_id", "student_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.course_id),
            Value::Integer(self.student_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            course_id: row.get("course_id")?,
            student_id: row.get("student_id")?,
            validation_results: ValidationResults::new(),
        })
    }
}

pub fn school() -> UnitOfWork<SchoolContext> {
    UnitOfWork::open().unwrap()
}

pub fn campus() -> UnitOfWork<CampusContext> {
    UnitOfWork::open().unwrap()
}

/// Inserts and saves `students` through the typed repository.
pub fn seed_students<C: ContextKind>(uow: &mut UnitOfWork<C>, students: &[(&str, i64)]) {
    let mut batch: Vec<Student> = students
        .iter()
        .map(|(name, age)| Student::new(*name, *age))
        .collect();
    uow.generic_repository::<Student>()
        .unwrap()
        .insert_many(&mut batch)
        .unwrap();
    uow.save_changes().unwrap();
}
