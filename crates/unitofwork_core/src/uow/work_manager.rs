//! Explicit cache of one unit of work per context kind.

use crate::config::DbConfig;
use crate::db::{ContextKind, DbError, DbResult};
use crate::uow::distributed::{save_changes_all, save_changes_all_async, TransactionalWork};
use crate::uow::unit_of_work::UnitOfWork;
use log::info;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Type-erased handle over a held `UnitOfWork<C>`.
trait ManagedUnit {
    fn dispose(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_transactional(&mut self) -> &mut dyn TransactionalWork;
}

impl<C: ContextKind> ManagedUnit for UnitOfWork<C> {
    fn dispose(&mut self) {
        UnitOfWork::dispose(self);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_transactional(&mut self) -> &mut dyn TransactionalWork {
        self
    }
}

/// Holds at most one unit of work per context kind, created on first
/// request and kept until `dispose`.
///
/// Units are kept in creation order, which is also the order used by
/// `save_changes_all`.
#[derive(Default)]
pub struct WorkManager {
    units: Vec<(TypeId, Box<dyn ManagedUnit>)>,
    configs: HashMap<TypeId, DbConfig>,
    disposed: bool,
}

impl WorkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database config used when `C`'s unit of work is created.
    ///
    /// Has no effect on a unit of work that already exists.
    pub fn configure<C: ContextKind>(&mut self, config: DbConfig) -> &mut Self {
        self.configs.insert(TypeId::of::<C>(), config);
        self
    }

    /// The unit of work for context kind `C`, opened on first request.
    pub fn unit_of_work<C: ContextKind>(&mut self) -> DbResult<&mut UnitOfWork<C>> {
        if self.disposed {
            return Err(DbError::Disposed);
        }

        let key = TypeId::of::<C>();
        let index = match self.units.iter().position(|(kind, _)| *kind == key) {
            Some(index) => index,
            None => {
                let config = self
                    .configs
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(C::default_config);
                let unit = UnitOfWork::<C>::open_with(&config)?;
                info!(
                    "event=work_manager_create module=uow status=ok context={} mode={}",
                    C::NAME,
                    config.mode()
                );
                self.units.push((key, Box::new(unit)));
                self.units.len() - 1
            }
        };

        self.units[index]
            .1
            .as_any_mut()
            .downcast_mut::<UnitOfWork<C>>()
            .ok_or(DbError::RegistryMismatch(C::NAME))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Distributed save over every held unit of work, in creation order.
    pub fn save_changes_all(&mut self) -> DbResult<usize> {
        if self.disposed {
            return Err(DbError::Disposed);
        }
        let mut members = self.members();
        save_changes_all(&mut members)
    }

    pub async fn save_changes_all_async(&mut self, cancel: &CancellationToken) -> DbResult<usize> {
        if self.disposed {
            return Err(DbError::Disposed);
        }
        let mut members = self.members();
        save_changes_all_async(&mut members, cancel).await
    }

    /// Disposes every held unit of work once. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let count = self.units.len();
        for (_, unit) in &mut self.units {
            unit.dispose();
        }
        self.units.clear();
        self.disposed = true;
        info!(
            "event=work_manager_dispose module=uow status=ok units={}",
            count
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn members(&mut self) -> Vec<&mut dyn TransactionalWork> {
        self.units
            .iter_mut()
            .map(|(_, unit)| unit.as_transactional())
            .collect()
    }
}

impl Drop for WorkManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
