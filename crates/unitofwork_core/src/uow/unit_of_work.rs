//! Single-context unit of work.

use crate::config::DbConfig;
use crate::db::{suspend, ContextKind, DbContext, DbError, DbResult, TransactionState};
use crate::model::entity::{Entity, Record};
use crate::pre_action::PreActionPipeline;
use crate::repo::generic_repo::GenericRepository;
use crate::repo::untyped_repo::Repository;
use crate::uow::distributed::TransactionalWork;
use log::info;
use rusqlite::Params;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// Owns one `DbContext` of kind `C`, the per-entity repository registry and
/// the transaction boundary.
///
/// Repositories are borrowed views: the registry keeps each entity type's
/// pre-action pipeline, created on first request and kept until disposal.
pub struct UnitOfWork<C: ContextKind> {
    ctx: DbContext,
    repositories: HashMap<TypeId, Box<dyn Any>>,
    untyped: Option<PreActionPipeline<dyn Record>>,
    disposed: bool,
    _kind: PhantomData<fn() -> C>,
}

impl<C: ContextKind> UnitOfWork<C> {
    /// Opens a unit of work with `C`'s default configuration.
    pub fn open() -> DbResult<Self> {
        Self::open_with(&C::default_config())
    }

    pub fn open_with(config: &DbConfig) -> DbResult<Self> {
        Ok(Self::from_context(DbContext::open::<C>(config)?))
    }

    pub fn from_context(ctx: DbContext) -> Self {
        Self {
            ctx,
            repositories: HashMap::new(),
            untyped: None,
            disposed: false,
            _kind: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        C::NAME
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.ctx.transaction_state()
    }

    /// Staged changes not yet flushed.
    pub fn pending_changes(&self) -> usize {
        self.ctx.pending_changes()
    }

    pub fn begin_transaction(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.ctx.begin_transaction()
    }

    pub fn commit(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.ctx.commit()
    }

    /// Rolls the store back and re-stages whatever was pending at
    /// `begin_transaction`.
    pub fn rollback(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.ctx.rollback()
    }

    /// Typed repository for `T`, registered on first request.
    pub fn generic_repository<T: Entity>(&mut self) -> DbResult<GenericRepository<'_, T>> {
        self.ensure_open()?;
        let slot = self
            .repositories
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(PreActionPipeline::<T>::new()));
        let pipeline = slot
            .downcast_ref::<PreActionPipeline<T>>()
            .ok_or(DbError::RegistryMismatch(T::TABLE))?;
        Ok(GenericRepository::new(&mut self.ctx, pipeline))
    }

    /// The untyped repository, created on first request.
    pub fn repository(&mut self) -> DbResult<Repository<'_>> {
        self.ensure_open()?;
        let pipeline = self.untyped.get_or_insert_with(PreActionPipeline::new);
        Ok(Repository::new(&mut self.ctx, pipeline))
    }

    /// Replaces the pre-action pipeline of `T`'s repository.
    pub fn pre_action<T: Entity>(&mut self, pipeline: PreActionPipeline<T>) -> DbResult<&mut Self> {
        self.ensure_open()?;
        self.repositories.insert(TypeId::of::<T>(), Box::new(pipeline));
        Ok(self)
    }

    /// Replaces the pre-action pipeline of the untyped repository.
    pub fn pre_action_untyped(
        &mut self,
        pipeline: PreActionPipeline<dyn Record>,
    ) -> DbResult<&mut Self> {
        self.ensure_open()?;
        self.untyped = Some(pipeline);
        Ok(self)
    }

    /// Flushes staged changes; returns the number of affected rows.
    pub fn save_changes(&mut self) -> DbResult<usize> {
        self.ensure_open()?;
        self.ctx.save_changes()
    }

    pub async fn save_changes_async(&mut self, cancel: &CancellationToken) -> DbResult<usize> {
        self.ensure_open()?;
        suspend(cancel).await?;
        self.ctx.save_changes()
    }

    /// Runs `sql` unchanged; returns the affected row count.
    pub fn execute_sql_command<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        self.ensure_open()?;
        self.ctx.execute_sql(sql, params)
    }

    /// Runs a raw query unchanged and materializes the rows as `T`.
    pub fn from_sql<T: Entity, P: Params>(&self, sql: &str, params: P) -> DbResult<Vec<T>> {
        self.ensure_open()?;
        self.ctx.query_sql(sql, params)
    }

    /// Clears the registries and closes the context. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.repositories.clear();
        self.untyped = None;
        self.ctx.dispose();
        self.disposed = true;
        info!(
            "event=uow_dispose module=uow status=ok context={}",
            C::NAME
        );
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.disposed {
            return Err(DbError::Disposed);
        }
        Ok(())
    }
}

impl<C: ContextKind> TransactionalWork for UnitOfWork<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn in_transaction(&self) -> bool {
        !self.disposed && self.ctx.transaction_state() == TransactionState::InTransaction
    }

    fn begin_transaction(&mut self) -> DbResult<()> {
        UnitOfWork::begin_transaction(self)
    }

    fn save_changes(&mut self) -> DbResult<usize> {
        UnitOfWork::save_changes(self)
    }

    fn commit(&mut self) -> DbResult<()> {
        UnitOfWork::commit(self)
    }

    fn rollback(&mut self) -> DbResult<()> {
        UnitOfWork::rollback(self)
    }
}

impl<C: ContextKind> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
