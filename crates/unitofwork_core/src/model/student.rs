//! Student sample entity.
//!
//! # Responsibility
//! - Provide the bundled `students` record used by `SchoolContext`.
//!
//! # Invariants
//! - `name` must be non-empty; the table enforces it with a CHECK constraint.
//! - `validation_results` is transient and never persisted.

use crate::model::entity::Entity;
use crate::model::validation::{Validatable, ValidationResults};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Store-assigned identity; `0` until the first save.
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    #[serde(skip)]
    pub validation_results: ValidationResults,
}

impl Student {
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self {
            name: name.into(),
            age: Some(age),
            ..Self::default()
        }
    }
}

impl Validatable for Student {
    fn validation_results(&self) -> &ValidationResults {
        &self.validation_results
    }

    fn validation_results_mut(&mut self) -> &mut ValidationResults {
        &mut self.validation_results
    }
}

impl Entity for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &["name", "age"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.age.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            age: row.get("age")?,
            validation_results: ValidationResults::new(),
        })
    }
}
