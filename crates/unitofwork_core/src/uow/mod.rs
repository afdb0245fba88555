//! Unit-of-work layer.
//!
//! # Responsibility
//! - Own one store context per unit of work together with its repository
//!   registry and transaction boundary.
//! - Coordinate saves across several units of work.
//! - Cache one unit of work per context kind in an explicit manager.
//!
//! # Invariants
//! - Writes reach the store only through `save_changes`.
//! - Disposal happens once; later calls return `DbError::Disposed`.

pub mod distributed;
pub mod unit_of_work;
pub mod work_manager;

pub use distributed::{save_changes_all, save_changes_all_async, TransactionalWork};
pub use unit_of_work::UnitOfWork;
pub use work_manager::WorkManager;
