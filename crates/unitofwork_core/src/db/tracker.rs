//! Change tracker backing `DbContext`.
//!
//! Entries are kept in staging order; identity lookups match on table and
//! store id, so records without an id are never resolved by key.
//!
//! `index` maps `(table, id)` to the first entry carrying that identity and
//! is rebuilt whenever entries are dropped, reordered or renumbered.

use crate::model::entity::{Record, UNASSIGNED_ID};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

pub(crate) struct TrackedEntry {
    pub(crate) state: EntryState,
    pub(crate) record: Box<dyn Record>,
}

impl Clone for TrackedEntry {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            record: self.record.clone_record(),
        }
    }
}

#[derive(Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
    index: HashMap<(&'static str, i64), usize>,
    checkpoint: Option<Vec<TrackedEntry>>,
}

impl ChangeTracker {
    pub(crate) fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub(crate) fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state != EntryState::Unchanged)
            .count()
    }

    pub(crate) fn lookup(&self, table: &'static str, id: i64) -> Option<&TrackedEntry> {
        self.position(table, id).map(|index| &self.entries[index])
    }

    pub(crate) fn add(&mut self, record: Box<dyn Record>) {
        self.push(record, EntryState::Added);
    }

    pub(crate) fn attach_unchanged(&mut self, record: Box<dyn Record>) {
        let table = record.entity_type().table();
        if self.position(table, record.record_id()).is_none() {
            self.push(record, EntryState::Unchanged);
        }
    }

    pub(crate) fn attach_modified(&mut self, record: Box<dyn Record>) {
        self.upsert(record, EntryState::Modified);
    }

    pub(crate) fn remove(&mut self, record: Box<dyn Record>) {
        self.upsert(record, EntryState::Deleted);
    }

    /// Marks a successful flush: applies store ids to inserted rows, drops
    /// deleted rows and resets everything else to `Unchanged`.
    pub(crate) fn accept(&mut self, assigned_ids: &[(usize, i64)]) {
        for (index, id) in assigned_ids {
            if let Some(entry) = self.entries.get_mut(*index) {
                entry.record.assign_record_id(*id);
            }
        }
        self.entries
            .retain(|entry| entry.state != EntryState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntryState::Unchanged;
        }
        self.reindex();
    }

    pub(crate) fn begin_checkpoint(&mut self) {
        self.checkpoint = Some(self.entries.clone());
    }

    pub(crate) fn discard_checkpoint(&mut self) {
        self.checkpoint = None;
    }

    /// Restores entries captured by `begin_checkpoint`, if any.
    pub(crate) fn restore_checkpoint(&mut self) {
        if let Some(entries) = self.checkpoint.take() {
            self.entries = entries;
            self.reindex();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.checkpoint = None;
    }

    fn upsert(&mut self, record: Box<dyn Record>, state: EntryState) {
        let table = record.entity_type().table();
        match self.position(table, record.record_id()) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.record = record;
                entry.state = state;
            }
            None => self.push(record, state),
        }
    }

    fn push(&mut self, record: Box<dyn Record>, state: EntryState) {
        let id = record.record_id();
        if id != UNASSIGNED_ID {
            self.index
                .entry((record.entity_type().table(), id))
                .or_insert(self.entries.len());
        }
        self.entries.push(TrackedEntry { state, record });
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            let id = entry.record.record_id();
            if id != UNASSIGNED_ID {
                self.index
                    .entry((entry.record.entity_type().table(), id))
                    .or_insert(position);
            }
        }
    }

    fn position(&self, table: &'static str, id: i64) -> Option<usize> {
        if id == UNASSIGNED_ID {
            return None;
        }
        self.index.get(&(table, id)).copied()
    }
}
