//! Untyped repository over capability-erased records.
//!
//! Writes only. Records of different entity types may share one batch;
//! each record's `EntityType` tag picks its table at flush time.

use super::{admit, Operation, RepoResult};
use crate::db::{suspend, DbContext, DbError};
use crate::model::entity::{EntityType, Record, UNASSIGNED_ID};
use crate::model::validation::Validatable;
use crate::pre_action::PreActionPipeline;
use tokio_util::sync::CancellationToken;

pub struct Repository<'uow> {
    ctx: &'uow mut DbContext,
    pipeline: &'uow PreActionPipeline<dyn Record>,
}

impl<'uow> Repository<'uow> {
    pub(crate) fn new(
        ctx: &'uow mut DbContext,
        pipeline: &'uow PreActionPipeline<dyn Record>,
    ) -> Self {
        Self { ctx, pipeline }
    }

    pub fn insert(&mut self, record: &mut dyn Record) -> RepoResult<()> {
        self.admit_one(Operation::Insert, record)?;
        Ok(self.ctx.add(record.clone_record())?)
    }

    pub fn insert_many(&mut self, records: &mut [Box<dyn Record>]) -> RepoResult<()> {
        self.admit_batch(Operation::Insert, records)?;
        self.stage(Operation::Insert, records)
    }

    pub async fn insert_async(
        &mut self,
        record: &mut dyn Record,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        suspend(cancel).await?;
        self.insert(record)
    }

    pub async fn insert_many_async(
        &mut self,
        records: &mut [Box<dyn Record>],
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        suspend(cancel).await?;
        self.insert_many(records)
    }

    pub fn update(&mut self, record: &mut dyn Record) -> RepoResult<()> {
        self.admit_one(Operation::Update, record)?;
        Ok(self.ctx.update(record.clone_record())?)
    }

    pub fn update_many(&mut self, records: &mut [Box<dyn Record>]) -> RepoResult<()> {
        self.admit_batch(Operation::Update, records)?;
        self.stage(Operation::Update, records)
    }

    pub fn delete(&mut self, record: &mut dyn Record) -> RepoResult<()> {
        self.admit_one(Operation::Delete, record)?;
        Ok(self.ctx.remove(record.clone_record())?)
    }

    pub fn delete_many(&mut self, records: &mut [Box<dyn Record>]) -> RepoResult<()> {
        self.admit_batch(Operation::Delete, records)?;
        self.stage(Operation::Delete, records)
    }

    /// Stages deletion of the `entity_type` row keyed `id`; `false` when
    /// nothing matched.
    pub fn delete_by_key(&mut self, entity_type: &EntityType, id: i64) -> RepoResult<bool> {
        let result = self.pipeline.run_on_type(entity_type.table())?;
        admit(
            Operation::Delete,
            entity_type.table(),
            result.validation_results(),
        )?;

        match self.ctx.find_record(entity_type, id)? {
            Some(mut record) => {
                self.delete(&mut *record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn admit_one(&self, operation: Operation, record: &mut dyn Record) -> RepoResult<()> {
        self.pipeline.run_on_entity(record)?;
        admit(
            operation,
            record.entity_type().table(),
            record.validation_results(),
        )
    }

    fn admit_batch(&self, operation: Operation, records: &mut [Box<dyn Record>]) -> RepoResult<()> {
        for record in records.iter_mut() {
            self.pipeline.run_on_entity(&mut **record)?;
        }
        match records
            .iter()
            .find(|record| !record.validation_results().is_empty())
        {
            Some(rejected) => admit(
                operation,
                rejected.entity_type().table(),
                rejected.validation_results(),
            ),
            None => Ok(()),
        }
    }

    fn stage(&mut self, operation: Operation, records: &[Box<dyn Record>]) -> RepoResult<()> {
        if operation != Operation::Insert {
            if let Some(unsaved) = records
                .iter()
                .find(|record| record.record_id() == UNASSIGNED_ID)
            {
                return Err(DbError::NotPersisted {
                    entity_type: unsaved.entity_type().table(),
                }
                .into());
            }
        }

        for record in records {
            let staged = record.clone_record();
            match operation {
                Operation::Insert => self.ctx.add(staged)?,
                Operation::Update => self.ctx.update(staged)?,
                Operation::Delete => self.ctx.remove(staged)?,
                Operation::Read | Operation::Count => {}
            }
        }
        Ok(())
    }
}
