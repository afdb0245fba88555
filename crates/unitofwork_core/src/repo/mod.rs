//! Repository layer: gated CRUD and query surfaces over a `DbContext`.
//!
//! # Responsibility
//! - Define the typed (`GenericRepository`) and untyped (`Repository`)
//!   data access handles handed out by a unit of work.
//! - Apply the pre-action gate before any read or staged write.
//!
//! # Invariants
//! - Gate polarity is uniform: an empty validation map admits the
//!   operation, a non-empty one rejects it with `RepoError::AccessDenied`.
//! - Absence of a record is `Ok(None)` / `Ok(false)`, never an error.

use crate::db::DbError;
use crate::model::validation::{ValidationError, ValidationResults};
use crate::paging::{PagedListAsyncError, PagingError};
use log::warn;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub mod generic_repo;
pub mod untyped_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Operation class checked by the pre-action gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Count,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("access denied: {operation} on {entity_type} rejected by [{}]", .results.codes())]
    AccessDenied {
        operation: Operation,
        entity_type: &'static str,
        results: ValidationResults,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error("`{path}` is not a navigation of {entity_type}")]
    UnknownInclude {
        entity_type: &'static str,
        path: String,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl RepoError {
    /// Findings that caused an access-denied rejection.
    pub fn validation_results(&self) -> Option<&ValidationResults> {
        match self {
            Self::AccessDenied { results, .. } => Some(results),
            _ => None,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PagedListAsyncError> for RepoError {
    fn from(value: PagedListAsyncError) -> Self {
        match value {
            PagedListAsyncError::Paging(err) => Self::Paging(err),
            PagedListAsyncError::Db(err) => Self::Db(err),
        }
    }
}

/// The gate: admits the operation only when `results` is empty.
pub(crate) fn admit(
    operation: Operation,
    entity_type: &'static str,
    results: &ValidationResults,
) -> RepoResult<()> {
    if results.is_empty() {
        return Ok(());
    }

    warn!(
        "event=pre_action_gate module=repo status=denied entity={} operation={} codes={}",
        entity_type,
        operation,
        results.codes()
    );
    Err(RepoError::AccessDenied {
        operation,
        entity_type,
        results: results.clone(),
    })
}

type Predicate<T> = Box<dyn Fn(&T) -> bool>;
type OrderBy<T> = Box<dyn Fn(&T, &T) -> Ordering>;

/// Read options for typed repository queries.
///
/// Defaults: no filter, key order, no includes, change tracking disabled.
pub struct QueryOptions<T> {
    predicate: Option<Predicate<T>>,
    order_by: Option<OrderBy<T>>,
    includes: Vec<String>,
    disable_tracking: bool,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            order_by: None,
            includes: Vec::new(),
            disable_tracking: true,
        }
    }
}

impl<T> Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("filtered", &self.predicate.is_some())
            .field("ordered", &self.order_by.is_some())
            .field("includes", &self.includes)
            .field("disable_tracking", &self.disable_tracking)
            .finish()
    }
}

impl<T> QueryOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Orders results with a stable sort; ties keep key order.
    pub fn order_by(mut self, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        self.order_by = Some(Box::new(compare));
        self
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(path.into());
        self
    }

    /// Tracks returned entities in the context's identity map when `true`.
    pub fn tracking(mut self, enabled: bool) -> Self {
        self.disable_tracking = !enabled;
        self
    }

    pub(crate) fn matches(&self, entity: &T) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(entity))
    }

    pub(crate) fn sort(&self, rows: &mut [T]) {
        if let Some(compare) = &self.order_by {
            rows.sort_by(|left, right| compare(left, right));
        }
    }

    pub(crate) fn includes(&self) -> &[String] {
        &self.includes
    }

    pub(crate) fn is_tracking(&self) -> bool {
        !self.disable_tracking
    }
}
