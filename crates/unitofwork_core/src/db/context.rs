//! Store context: one SQLite connection plus its change tracker.
//!
//! # Responsibility
//! - Stage inserts/updates/deletes and flush them on `save_changes`.
//! - Serve key lookups through the identity map before hitting SQLite.
//! - Own the explicit transaction boundary of a unit of work.
//!
//! # Invariants
//! - A flush is atomic: its own transaction when `Open`, a savepoint when
//!   `InTransaction`. Staged changes survive a failed flush.
//! - `rollback` rewinds the tracker to its state at `begin_transaction`.
//! - After `dispose` every operation returns `DbError::Disposed`.

use super::migrations::{Migration, SCHOOL_MIGRATIONS};
use super::open::open_db;
use super::tracker::{ChangeTracker, EntryState, TrackedEntry};
use super::{DbError, DbResult};
use crate::config::DbConfig;
use crate::model::entity::{Entity, EntityType, Record, KEY_COLUMN, UNASSIGNED_ID};
use log::{error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Params};
use std::time::Instant;

/// Names a context type and the schema its database carries.
pub trait ContextKind: 'static {
    const NAME: &'static str;

    fn migrations() -> &'static [Migration];

    fn default_config() -> DbConfig {
        DbConfig::default()
    }
}

/// Bundled context holding the `students` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchoolContext;

impl ContextKind for SchoolContext {
    const NAME: &'static str = "school";

    fn migrations() -> &'static [Migration] {
        SCHOOL_MIGRATIONS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    InTransaction,
}

pub struct DbContext {
    name: &'static str,
    conn: Option<Connection>,
    tracker: ChangeTracker,
    transaction: TransactionState,
}

impl DbContext {
    /// Opens the database for context kind `C` with `config`.
    pub fn open<C: ContextKind>(config: &DbConfig) -> DbResult<Self> {
        let conn = open_db(config, C::migrations())?;
        Ok(Self::from_connection(C::NAME, conn))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(name: &'static str, conn: Connection) -> Self {
        Self {
            name,
            conn: Some(conn),
            tracker: ChangeTracker::default(),
            transaction: TransactionState::Open,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_disposed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::Disposed)
    }

    /// Number of staged inserts, updates and deletes.
    pub fn pending_changes(&self) -> usize {
        self.tracker.pending()
    }

    pub fn add(&mut self, record: Box<dyn Record>) -> DbResult<()> {
        self.connection()?;
        self.tracker.add(record);
        Ok(())
    }

    pub fn update(&mut self, record: Box<dyn Record>) -> DbResult<()> {
        self.connection()?;
        ensure_persisted(&*record)?;
        self.tracker.attach_modified(record);
        Ok(())
    }

    pub fn remove(&mut self, record: Box<dyn Record>) -> DbResult<()> {
        self.connection()?;
        ensure_persisted(&*record)?;
        self.tracker.remove(record);
        Ok(())
    }

    /// Resolves loaded rows against the identity map and tracks new ones.
    pub(crate) fn track<T: Entity>(&mut self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .map(|row| {
                if let Some(entry) = self.tracker.lookup(T::TABLE, row.id()) {
                    if let Some(tracked) = entry.record.downcast_ref::<T>() {
                        return tracked.clone();
                    }
                }
                self.tracker.attach_unchanged(Box::new(row.clone()));
                row
            })
            .collect()
    }

    /// Loads every row of `T`'s table in key order.
    pub fn load_all<T: Entity>(&self) -> DbResult<Vec<T>> {
        let sql = select_sql(&T::descriptor(), &format!(" ORDER BY {KEY_COLUMN} ASC"));
        query_entities(self.connection()?, &sql, [])
    }

    pub fn count<T: Entity>(&self) -> DbResult<usize> {
        let count = self.connection()?.query_row(
            &format!("SELECT COUNT(*) FROM {};", T::TABLE),
            [],
            |row| row.get::<_, usize>(0),
        )?;
        Ok(count)
    }

    /// Finds one `T` by key, preferring the tracked instance.
    ///
    /// A tracked record of another type mapped onto the same table is a
    /// `RegistryMismatch`, not a miss.
    pub fn find<T: Entity>(&mut self, id: i64) -> DbResult<Option<T>> {
        match self.find_record(&T::descriptor(), id)? {
            Some(record) => record
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or(DbError::RegistryMismatch(T::TABLE)),
            None => Ok(None),
        }
    }

    /// Finds one record of `entity_type` by key.
    ///
    /// Returns `None` when no row matches or the tracked row is staged for
    /// deletion. Rows fetched from SQLite are tracked as unchanged.
    pub fn find_record(
        &mut self,
        entity_type: &EntityType,
        id: i64,
    ) -> DbResult<Option<Box<dyn Record>>> {
        let conn = self.conn.as_ref().ok_or(DbError::Disposed)?;
        if let Some(entry) = self.tracker.lookup(entity_type.table(), id) {
            if entry.state == EntryState::Deleted {
                return Ok(None);
            }
            return Ok(Some(entry.record.clone_record()));
        }

        let found = query_record(conn, entity_type, id)?;
        if let Some(record) = &found {
            self.tracker.attach_unchanged(record.clone_record());
        }
        Ok(found)
    }

    /// Executes raw SQL and returns the affected row count.
    pub fn execute_sql<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        Ok(self.connection()?.execute(sql, params)?)
    }

    /// Runs a raw query and materializes the rows as `T`.
    pub fn query_sql<T: Entity, P: Params>(&self, sql: &str, params: P) -> DbResult<Vec<T>> {
        query_entities(self.connection()?, sql, params)
    }

    pub fn begin_transaction(&mut self) -> DbResult<()> {
        let conn = self.conn.as_ref().ok_or(DbError::Disposed)?;
        if self.transaction == TransactionState::InTransaction {
            return Err(DbError::TransactionAlreadyActive(self.name));
        }
        conn.execute_batch("BEGIN;")?;
        self.transaction = TransactionState::InTransaction;
        self.tracker.begin_checkpoint();
        info!(
            "event=uow_transaction module=db status=begin context={}",
            self.name
        );
        Ok(())
    }

    pub fn commit(&mut self) -> DbResult<()> {
        let conn = self.conn.as_ref().ok_or(DbError::Disposed)?;
        if self.transaction == TransactionState::Open {
            return Err(DbError::NoActiveTransaction(self.name));
        }
        conn.execute_batch("COMMIT;")?;
        self.transaction = TransactionState::Open;
        self.tracker.discard_checkpoint();
        info!(
            "event=uow_transaction module=db status=commit context={}",
            self.name
        );
        Ok(())
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        let conn = self.conn.as_ref().ok_or(DbError::Disposed)?;
        if self.transaction == TransactionState::Open {
            return Err(DbError::NoActiveTransaction(self.name));
        }
        let result = conn.execute_batch("ROLLBACK;");
        self.transaction = TransactionState::Open;
        self.tracker.restore_checkpoint();
        info!(
            "event=uow_transaction module=db status=rollback context={}",
            self.name
        );
        Ok(result?)
    }

    /// Flushes staged changes and returns the number of affected rows.
    pub fn save_changes(&mut self) -> DbResult<usize> {
        let started_at = Instant::now();
        let conn = self.conn.as_ref().ok_or(DbError::Disposed)?;
        if self.tracker.pending() == 0 {
            return Ok(0);
        }

        let (open, close, undo) = match self.transaction {
            TransactionState::Open => ("BEGIN IMMEDIATE;", "COMMIT;", "ROLLBACK;"),
            TransactionState::InTransaction => (
                "SAVEPOINT save_changes;",
                "RELEASE save_changes;",
                "ROLLBACK TO save_changes; RELEASE save_changes;",
            ),
        };

        conn.execute_batch(open)?;
        let flushed = flush(conn, self.tracker.entries()).and_then(|outcome| {
            conn.execute_batch(close)?;
            Ok(outcome)
        });

        match flushed {
            Ok((affected, assigned_ids)) => {
                self.tracker.accept(&assigned_ids);
                info!(
                    "event=uow_save module=db status=ok context={} affected={} duration_ms={}",
                    self.name,
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                if let Err(undo_err) = conn.execute_batch(undo) {
                    warn!(
                        "event=uow_save module=db status=undo_failed context={} error={}",
                        self.name, undo_err
                    );
                }
                error!(
                    "event=uow_save module=db status=error context={} duration_ms={} error={}",
                    self.name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Drops tracked state and closes the connection. Safe to call twice.
    pub fn dispose(&mut self) {
        self.tracker.clear();
        self.transaction = TransactionState::Open;
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => info!("event=db_close module=db status=ok context={}", self.name),
                Err((_, err)) => warn!(
                    "event=db_close module=db status=error context={} error={}",
                    self.name, err
                ),
            }
        }
    }
}

fn ensure_persisted(record: &dyn Record) -> DbResult<()> {
    if record.record_id() == UNASSIGNED_ID {
        return Err(DbError::NotPersisted {
            entity_type: record.entity_type().table(),
        });
    }
    Ok(())
}

fn select_sql(entity_type: &EntityType, tail: &str) -> String {
    format!(
        "SELECT {KEY_COLUMN}, {} FROM {}{tail}",
        entity_type.columns().join(", "),
        entity_type.table()
    )
}

fn query_entities<T: Entity, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> DbResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(T::from_row(row)?);
    }
    Ok(entities)
}

fn query_record(
    conn: &Connection,
    entity_type: &EntityType,
    id: i64,
) -> DbResult<Option<Box<dyn Record>>> {
    let sql = select_sql(entity_type, &format!(" WHERE {KEY_COLUMN} = ?1"));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(entity_type.load(row)?)),
        None => Ok(None),
    }
}

/// Writes every staged entry; returns affected rows and `(entry index, new id)`
/// pairs for inserted records.
fn flush(conn: &Connection, entries: &[TrackedEntry]) -> DbResult<(usize, Vec<(usize, i64)>)> {
    let mut affected = 0;
    let mut assigned_ids = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let record = &*entry.record;
        let entity_type = record.entity_type();
        let table = entity_type.table();
        let columns = entity_type.columns();

        match entry.state {
            EntryState::Unchanged => {}
            EntryState::Added => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {table} DEFAULT VALUES;")
                } else {
                    let placeholders = (1..=columns.len())
                        .map(|position| format!("?{position}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "INSERT INTO {table} ({}) VALUES ({placeholders});",
                        columns.join(", ")
                    )
                };
                affected += conn.execute(&sql, params_from_iter(record.record_values()))?;
                assigned_ids.push((index, conn.last_insert_rowid()));
            }
            EntryState::Modified => {
                let assignments = columns
                    .iter()
                    .enumerate()
                    .map(|(position, column)| format!("{column} = ?{}", position + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {table} SET {assignments} WHERE {KEY_COLUMN} = ?{};",
                    columns.len() + 1
                );
                let mut values = record.record_values();
                values.push(Value::Integer(record.record_id()));
                affected += expect_row(conn.execute(&sql, params_from_iter(values))?, record)?;
            }
            EntryState::Deleted => {
                let sql = format!("DELETE FROM {table} WHERE {KEY_COLUMN} = ?1;");
                affected += expect_row(conn.execute(&sql, [record.record_id()])?, record)?;
            }
        }
    }

    Ok((affected, assigned_ids))
}

fn expect_row(changed: usize, record: &dyn Record) -> DbResult<usize> {
    if changed == 0 {
        return Err(DbError::RecordNotFound {
            entity_type: record.entity_type().table(),
            id: record.record_id(),
        });
    }
    Ok(changed)
}
