//! Best-effort save across several units of work.
//!
//! # Invariants
//! - Global order is begin-all, then save-all, then commit-all.
//! - On failure every member still holding a transaction this call began
//!   is rolled back and the original error is returned.
//! - There is no two-phase commit: a commit-phase failure leaves earlier
//!   members committed and is logged as `status=partial_commit`.

use crate::db::{suspend, DbError, DbResult};
use log::{error, info, warn};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Transaction surface a unit of work exposes to the coordinator.
pub trait TransactionalWork {
    fn name(&self) -> &'static str;
    fn in_transaction(&self) -> bool;
    fn begin_transaction(&mut self) -> DbResult<()>;
    fn save_changes(&mut self) -> DbResult<usize>;
    fn commit(&mut self) -> DbResult<()>;
    fn rollback(&mut self) -> DbResult<()>;
}

/// Saves every member inside its own transaction and commits only when all
/// saves succeeded. Returns the total number of affected rows.
pub fn save_changes_all(members: &mut [&mut dyn TransactionalWork]) -> DbResult<usize> {
    let started_at = Instant::now();

    let begin_failure = members
        .iter_mut()
        .enumerate()
        .find_map(|(index, member)| member.begin_transaction().err().map(|err| (index, err)));
    if let Some((index, err)) = begin_failure {
        return Err(abort(&mut members[..index], err, "begin", started_at));
    }

    let mut affected = 0;
    let saved = members.iter_mut().try_for_each(|member| {
        affected += member.save_changes()?;
        Ok::<(), DbError>(())
    });
    if let Err(err) = saved {
        return Err(abort(members, err, "save", started_at));
    }

    let commit_failure = members
        .iter_mut()
        .enumerate()
        .find_map(|(index, member)| member.commit().err().map(|err| (index, err)));
    if let Some((index, err)) = commit_failure {
        if index > 0 {
            warn!(
                "event=distributed_save module=uow status=partial_commit committed={} failed={}",
                index,
                members[index].name()
            );
        }
        return Err(abort(&mut members[index..], err, "commit", started_at));
    }

    info!(
        "event=distributed_save module=uow status=ok members={} affected={} duration_ms={}",
        members.len(),
        affected,
        started_at.elapsed().as_millis()
    );
    Ok(affected)
}

/// Same as `save_changes_all`, after a cancellable suspension point.
pub async fn save_changes_all_async(
    members: &mut [&mut dyn TransactionalWork],
    cancel: &CancellationToken,
) -> DbResult<usize> {
    suspend(cancel).await?;
    save_changes_all(members)
}

fn abort(
    members: &mut [&mut dyn TransactionalWork],
    err: DbError,
    phase: &str,
    started_at: Instant,
) -> DbError {
    for member in members.iter_mut().filter(|member| member.in_transaction()) {
        if let Err(rollback_err) = member.rollback() {
            warn!(
                "event=distributed_save module=uow status=rollback_failed context={} error={}",
                member.name(),
                rollback_err
            );
        }
    }
    error!(
        "event=distributed_save module=uow status=error phase={} duration_ms={} error={}",
        phase,
        started_at.elapsed().as_millis(),
        err
    );
    err
}
