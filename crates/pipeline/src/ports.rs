//! Port traits: what the analysis domain needs from the outside world.
//!
//! Infrastructure crates implement these; the orchestration layer consumes
//! them as trait objects (`Arc<dyn ...>`), so tests can swap any of them for an
//! in-process stub.

use async_trait::async_trait;

use crate::errors::{CollaboratorError, StoreError, TransitionError};
use crate::parcel::LandParcel;
use crate::report::PolicyRecord;
use crate::task::TaskRecord;
use crate::TaskId;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Produces the professional-language analysis of a parcel.
///
/// The returned text is opaque to the pipeline: it is embedded in the report
/// as-is. Implementations must be side-effect-free so a failed call can be
/// retried safely.
#[async_trait]
pub trait KnowledgeCollaborator: Send + Sync {
    async fn analyze(&self, parcel: &LandParcel) -> Result<String, CollaboratorError>;
}

/// Finds candidate support policies for a parcel's region and attributes.
///
/// An empty list is a valid answer, not an error.
#[async_trait]
pub trait PolicyCollaborator: Send + Sync {
    async fn find_policies(
        &self,
        parcel: &LandParcel,
    ) -> Result<Vec<PolicyRecord>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Task storage
// ---------------------------------------------------------------------------

/// Closure applied by [`TaskStore::update`] to a working copy of a record.
pub type TaskMutator<'a> = &'a mut dyn FnMut(&mut TaskRecord) -> Result<(), TransitionError>;

/// Concurrency-safe keyed storage for task records.
///
/// All mutation goes through [`update`](TaskStore::update). Implementations
/// must guarantee that concurrent readers observe either the record before an
/// update or the record after it, never an intermediate.
pub trait TaskStore: Send + Sync {
    /// Allocates a fresh id and inserts a Pending record for `parcel`.
    fn create(&self, parcel: LandParcel) -> TaskRecord;

    /// Returns a snapshot of the record.
    fn get(&self, task_id: TaskId) -> Result<TaskRecord, StoreError>;

    /// Applies `mutator` atomically and returns the committed record.
    ///
    /// The mutator runs against a copy; if it returns an error the stored
    /// record is left exactly as it was and the error is returned as
    /// [`StoreError::Transition`].
    fn update(&self, task_id: TaskId, mutator: TaskMutator<'_>) -> Result<TaskRecord, StoreError>;

    /// Snapshot of every record, oldest first.
    fn list(&self) -> Vec<TaskRecord>;

    /// Number of tasks currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
