//! SQLite store context, bootstrap and schema migrations.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a context kind.
//! - Track staged entity changes and flush them inside transactions.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Staged changes reach the database only through `DbContext::save_changes`.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod context;
pub mod migrations;
mod open;
mod tracker;

pub use context::{ContextKind, DbContext, SchoolContext, TransactionState};
pub use open::open_db;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("context has been disposed")]
    Disposed,
    #[error("operation was cancelled")]
    Cancelled,
    #[error("a transaction is already active on context `{0}`")]
    TransactionAlreadyActive(&'static str),
    #[error("no active transaction on context `{0}`")]
    NoActiveTransaction(&'static str),
    #[error("{entity_type} record has no store identity yet")]
    NotPersisted { entity_type: &'static str },
    #[error("{entity_type} record {id} no longer exists")]
    RecordNotFound { entity_type: &'static str, id: i64 },
    #[error("repository registry holds an unexpected slot for `{0}`")]
    RegistryMismatch(&'static str),
}

/// Cooperative suspension point for async operations.
///
/// Returns `Cancelled` when `cancel` fired before or during the yield; callers
/// run their work only after this returns `Ok`.
pub(crate) async fn suspend(cancel: &CancellationToken) -> DbResult<()> {
    if cancel.is_cancelled() {
        return Err(DbError::Cancelled);
    }
    tokio::task::yield_now().await;
    if cancel.is_cancelled() {
        return Err(DbError::Cancelled);
    }
    Ok(())
}
