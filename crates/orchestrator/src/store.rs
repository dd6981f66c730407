//! In-memory [`TaskStore`] backed by [`DashMap`].
//!
//! # Concurrency
//!
//! `DashMap` provides shard-level locking. [`InMemoryTaskStore::update`] holds
//! the entry's write guard for the whole read-modify-write, so two updates to
//! the same task are serialized while updates to different tasks proceed in
//! parallel. Mutators must not call back into the store: doing so while the
//! guard is held would deadlock on the shard.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use pipeline::{LandParcel, StoreError, TaskId, TaskMutator, TaskRecord, TaskStore, Timestamp};

/// Process-local task storage. Records live until the process exits.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, TaskRecord>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, parcel: LandParcel) -> TaskRecord {
        let now = Timestamp::now();
        loop {
            let id = TaskId::new_random();
            // A v4 collision is astronomically unlikely, but an id is never reused.
            if let Entry::Vacant(slot) = self.tasks.entry(id) {
                let record = TaskRecord::new(id, parcel, now);
                slot.insert(record.clone());
                return record;
            }
        }
    }

    fn get(&self, task_id: TaskId) -> Result<TaskRecord, StoreError> {
        self.tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound { task_id })
    }

    fn update(&self, task_id: TaskId, mutator: TaskMutator<'_>) -> Result<TaskRecord, StoreError> {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or(StoreError::NotFound { task_id })?;

        let mut working = entry.value().clone();
        mutator(&mut working)?;
        *entry.value_mut() = working.clone();
        Ok(working)
    }

    fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.tasks.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| (record.created_at(), record.id()));
        records
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}
