//! Typed repository over one entity table.
//!
//! # Responsibility
//! - Serve gated reads (all, by key, first, paged, counts) for one `Entity`.
//! - Stage gated inserts, updates and deletes on the owning context.
//!
//! # Invariants
//! - Every read and write runs the pre-action pipeline first.
//! - Batch writes stage nothing when any item is rejected.
//! - Reads go load → track → include → filter → sort → page/first.
//! - Async variants only differ by a cancellable suspension point taken
//!   before any work.

use super::{admit, Operation, QueryOptions, RepoError, RepoResult};
use crate::db::{suspend, DbContext, DbError};
use crate::model::entity::{Entity, UNASSIGNED_ID};
use crate::model::validation::Validatable;
use crate::paging::PagedList;
use crate::pre_action::PreActionPipeline;
use rusqlite::Params;
use tokio_util::sync::CancellationToken;

/// Gated CRUD and query surface for entity type `T`.
///
/// Borrowed from a unit of work; the pipeline is the one configured there
/// with `UnitOfWork::pre_action`.
pub struct GenericRepository<'uow, T: Entity> {
    ctx: &'uow mut DbContext,
    pipeline: &'uow PreActionPipeline<T>,
}

impl<'uow, T: Entity> GenericRepository<'uow, T> {
    pub(crate) fn new(ctx: &'uow mut DbContext, pipeline: &'uow PreActionPipeline<T>) -> Self {
        Self { ctx, pipeline }
    }

    /// Every row in key order, untracked.
    pub fn get_all(&mut self) -> RepoResult<Vec<T>> {
        self.admit_type(Operation::Read)?;
        self.load(&QueryOptions::default())
    }

    /// Looks `id` up, preferring an instance the context already tracks.
    pub fn find(&mut self, id: i64) -> RepoResult<Option<T>> {
        self.admit_type(Operation::Read)?;
        Ok(self.ctx.find::<T>(id)?)
    }

    pub async fn find_async(&mut self, id: i64, cancel: &CancellationToken) -> RepoResult<Option<T>> {
        suspend(cancel).await?;
        self.find(id)
    }

    pub fn get_first_or_default(&mut self, query: QueryOptions<T>) -> RepoResult<Option<T>> {
        self.admit_type(Operation::Read)?;
        Ok(self.load(&query)?.into_iter().next())
    }

    pub async fn get_first_or_default_async(
        &mut self,
        query: QueryOptions<T>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        suspend(cancel).await?;
        self.get_first_or_default(query)
    }

    pub fn get_first_or_default_projected<R>(
        &mut self,
        selector: impl FnOnce(T) -> R,
        query: QueryOptions<T>,
    ) -> RepoResult<Option<R>> {
        Ok(self.get_first_or_default(query)?.map(selector))
    }

    pub async fn get_first_or_default_projected_async<R>(
        &mut self,
        selector: impl FnOnce(T) -> R,
        query: QueryOptions<T>,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<R>> {
        suspend(cancel).await?;
        self.get_first_or_default_projected(selector, query)
    }

    /// Page `page_index` (zero-based) of the filtered, ordered rows.
    pub fn get_paged_list(
        &mut self,
        query: QueryOptions<T>,
        page_index: usize,
        page_size: usize,
    ) -> RepoResult<PagedList<T>> {
        self.admit_type(Operation::Read)?;
        let rows = self.load(&query)?;
        Ok(PagedList::new(rows, page_index, page_size)?)
    }

    pub async fn get_paged_list_async(
        &mut self,
        query: QueryOptions<T>,
        page_index: usize,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> RepoResult<PagedList<T>> {
        self.admit_type(Operation::Read)?;
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled.into());
        }
        let rows = self.load(&query)?;
        Ok(PagedList::new_async(rows, page_index, page_size, cancel).await?)
    }

    pub fn get_paged_list_projected<R>(
        &mut self,
        selector: impl FnMut(T) -> R,
        query: QueryOptions<T>,
        page_index: usize,
        page_size: usize,
    ) -> RepoResult<PagedList<R>> {
        Ok(self
            .get_paged_list(query, page_index, page_size)?
            .map(selector))
    }

    pub async fn get_paged_list_projected_async<R>(
        &mut self,
        selector: impl FnMut(T) -> R,
        query: QueryOptions<T>,
        page_index: usize,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> RepoResult<PagedList<R>> {
        let page = self
            .get_paged_list_async(query, page_index, page_size, cancel)
            .await?;
        Ok(page.map(selector))
    }

    pub fn count(&mut self) -> RepoResult<usize> {
        self.admit_type(Operation::Count)?;
        Ok(self.ctx.count::<T>()?)
    }

    pub fn count_where(&mut self, predicate: impl Fn(&T) -> bool + 'static) -> RepoResult<usize> {
        self.admit_type(Operation::Count)?;
        Ok(self.load(&QueryOptions::new().filter(predicate))?.len())
    }

    /// Stages `entity` for insertion. Findings stay on `entity`.
    pub fn insert(&mut self, entity: &mut T) -> RepoResult<()> {
        self.insert_many(std::slice::from_mut(entity))
    }

    pub fn insert_many(&mut self, entities: &mut [T]) -> RepoResult<()> {
        self.admit_batch(Operation::Insert, entities)?;
        self.stage(Operation::Insert, entities)
    }

    pub async fn insert_async(&mut self, entity: &mut T, cancel: &CancellationToken) -> RepoResult<()> {
        suspend(cancel).await?;
        self.insert(entity)
    }

    pub async fn insert_many_async(
        &mut self,
        entities: &mut [T],
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        suspend(cancel).await?;
        self.insert_many(entities)
    }

    pub fn update(&mut self, entity: &mut T) -> RepoResult<()> {
        self.update_many(std::slice::from_mut(entity))
    }

    pub async fn update_async(&mut self, entity: &mut T, cancel: &CancellationToken) -> RepoResult<()> {
        suspend(cancel).await?;
        self.update(entity)
    }

    pub fn update_many(&mut self, entities: &mut [T]) -> RepoResult<()> {
        self.admit_batch(Operation::Update, entities)?;
        self.stage(Operation::Update, entities)
    }

    pub fn delete(&mut self, entity: &mut T) -> RepoResult<()> {
        self.delete_many(std::slice::from_mut(entity))
    }

    pub fn delete_many(&mut self, entities: &mut [T]) -> RepoResult<()> {
        self.admit_batch(Operation::Delete, entities)?;
        self.stage(Operation::Delete, entities)
    }

    /// Stages deletion of the row keyed `id`; `false` when nothing matched.
    pub fn delete_by_key(&mut self, id: i64) -> RepoResult<bool> {
        self.admit_type(Operation::Delete)?;
        match self.ctx.find::<T>(id)? {
            Some(mut entity) => {
                self.delete(&mut entity)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Raw query passthrough; rows must carry `id` and every column of `T`.
    pub fn from_sql<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<T>> {
        Ok(self.ctx.query_sql::<T, P>(sql, params)?)
    }

    fn admit_type(&self, operation: Operation) -> RepoResult<()> {
        let result = self.pipeline.run_on_type(T::TABLE)?;
        admit(operation, T::TABLE, result.validation_results())
    }

    fn admit_batch(&self, operation: Operation, entities: &mut [T]) -> RepoResult<()> {
        for entity in entities.iter_mut() {
            self.pipeline.run_on_entity(entity)?;
        }
        match entities
            .iter()
            .find(|entity| !entity.validation_results().is_empty())
        {
            Some(rejected) => admit(operation, T::TABLE, rejected.validation_results()),
            None => Ok(()),
        }
    }

    fn stage(&mut self, operation: Operation, entities: &[T]) -> RepoResult<()> {
        if operation != Operation::Insert && entities.iter().any(|e| e.id() == UNASSIGNED_ID) {
            return Err(DbError::NotPersisted {
                entity_type: T::TABLE,
            }
            .into());
        }

        for entity in entities {
            let record = Box::new(entity.clone());
            match operation {
                Operation::Insert => self.ctx.add(record)?,
                Operation::Update => self.ctx.update(record)?,
                Operation::Delete => self.ctx.remove(record)?,
                Operation::Read | Operation::Count => {}
            }
        }
        Ok(())
    }

    fn load(&mut self, query: &QueryOptions<T>) -> RepoResult<Vec<T>> {
        if let Some(path) = query
            .includes()
            .iter()
            .find(|path| !T::NAVIGATIONS.contains(&path.as_str()))
        {
            return Err(RepoError::UnknownInclude {
                entity_type: T::TABLE,
                path: path.clone(),
            });
        }

        let mut rows = self.ctx.load_all::<T>()?;
        if query.is_tracking() {
            rows = self.ctx.track(rows);
        }
        if !query.includes().is_empty() {
            let conn = self.ctx.connection()?;
            for row in &mut rows {
                for path in query.includes() {
                    row.include(path, conn)?;
                }
            }
        }

        let mut rows: Vec<T> = rows.into_iter().filter(|row| query.matches(row)).collect();
        query.sort(&mut rows);
        Ok(rows)
    }
}
