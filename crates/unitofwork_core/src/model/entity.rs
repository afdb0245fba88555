//! Persisted record contracts.
//!
//! # Responsibility
//! - Describe how a typed entity maps onto one table (`Entity`).
//! - Expose a capability-erased view for heterogeneous batches (`Record`).
//! - Carry a runtime type tag (`EntityType`) used instead of reflection.
//!
//! # Invariants
//! - Identity is store-assigned; `0` means "not inserted yet".
//! - `Entity::from_row` reads columns by name: `id` plus every `COLUMNS` entry.
//! - `to_values` yields values in `COLUMNS` order.

use crate::model::validation::Validatable;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::any::Any;
use std::fmt::{Debug, Formatter};

/// Primary key column shared by every entity table.
pub const KEY_COLUMN: &str = "id";

/// Identity value of an entity that has not been inserted yet.
pub const UNASSIGNED_ID: i64 = 0;

/// Typed mapping between one Rust struct and one table.
pub trait Entity: Validatable + Clone + 'static {
    /// Table holding rows of this entity.
    const TABLE: &'static str;
    /// Non-key columns, in the order produced by `to_values`.
    const COLUMNS: &'static [&'static str];
    /// Navigation paths `include` knows how to load.
    const NAVIGATIONS: &'static [&'static str] = &[];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn to_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Eager-loads one navigation path listed in `NAVIGATIONS`.
    fn include(&mut self, _path: &str, _conn: &Connection) -> rusqlite::Result<()> {
        Ok(())
    }

    /// Runtime type tag for this entity.
    fn descriptor() -> EntityType {
        EntityType {
            table: Self::TABLE,
            columns: Self::COLUMNS,
            load: load_boxed::<Self>,
        }
    }
}

/// Runtime type tag: table shape plus a boxed row loader.
#[derive(Clone, Copy)]
pub struct EntityType {
    table: &'static str,
    columns: &'static [&'static str],
    load: fn(&Row<'_>) -> rusqlite::Result<Box<dyn Record>>,
}

impl EntityType {
    pub fn of<T: Entity>() -> Self {
        T::descriptor()
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub(crate) fn load(&self, row: &Row<'_>) -> rusqlite::Result<Box<dyn Record>> {
        (self.load)(row)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl Eq for EntityType {}

impl Debug for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityType")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish()
    }
}

fn load_boxed<T: Entity>(row: &Row<'_>) -> rusqlite::Result<Box<dyn Record>> {
    T::from_row(row).map(|entity| Box::new(entity) as Box<dyn Record>)
}

/// Object-safe view over any entity, used by the untyped repository and
/// the change tracker.
pub trait Record: Validatable + Any {
    fn entity_type(&self) -> EntityType;
    fn record_id(&self) -> i64;
    fn assign_record_id(&mut self, id: i64);
    fn record_values(&self) -> Vec<Value>;
    fn clone_record(&self) -> Box<dyn Record>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> Record for T {
    fn entity_type(&self) -> EntityType {
        T::descriptor()
    }

    fn record_id(&self) -> i64 {
        self.id()
    }

    fn assign_record_id(&mut self, id: i64) {
        self.set_id(id);
    }

    fn record_values(&self) -> Vec<Value> {
        self.to_values()
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Record {
    /// Borrows the concrete entity when this record is a `T`.
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Debug for dyn Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.entity_type().table())
            .field("id", &self.record_id())
            .finish()
    }
}
