//! Unit-of-work data access core.
//! Repositories, pre-action gates and transaction coordination over SQLite.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod paging;
pub mod pre_action;
pub mod repo;
pub mod uow;

pub use config::{DbConfig, DbLocation};
pub use db::{ContextKind, DbContext, DbError, DbResult, SchoolContext, TransactionState};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityType, Record};
pub use model::student::Student;
pub use model::validation::{Validatable, ValidationError, ValidationResult, ValidationResults};
pub use paging::{PagedList, PagingError, DEFAULT_PAGE_SIZE};
pub use pre_action::student_age::StudentAgeGate;
pub use pre_action::{PreActionHandler, PreActionPipeline, PreActionTarget};
pub use repo::generic_repo::GenericRepository;
pub use repo::untyped_repo::Repository;
pub use repo::{Operation, QueryOptions, RepoError, RepoResult};
pub use tokio_util::sync::CancellationToken;
pub use uow::{save_changes_all, save_changes_all_async, TransactionalWork, UnitOfWork, WorkManager};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
