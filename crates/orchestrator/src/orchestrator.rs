//! The task orchestrator facade.
//!
//! [`TaskOrchestrator::submit`] creates a task and returns its id at once; the
//! pipeline runs on a spawned Tokio task. Callers poll with
//! [`status`](TaskOrchestrator::status) and
//! [`result`](TaskOrchestrator::result). The orchestrator keeps no handle to
//! the in-flight run: a detached supervisor owns the join handle and turns a
//! panic into an `Internal` failure, so every task reaches a terminal state.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use pipeline::{
    AnalysisResult, InvalidParcel, KnowledgeCollaborator, LandParcel, ParcelSubmission,
    PolicyCollaborator, Progress, Stage, StoreError, TaskFailure, TaskId, TaskRecord, TaskStatus,
    TaskStore, Timestamp,
};

use crate::executor::{ExecutorConfig, PipelineExecutor};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by the [`TaskOrchestrator`] query and submit operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// The submission is structurally incomplete; no task was created.
    #[error("missing required parcel fields: {}", .missing.join(", "))]
    InvalidInput { missing: Vec<&'static str> },

    /// No task exists with this id.
    #[error("task not found: {task_id}")]
    NotFound { task_id: TaskId },

    /// The task exists but has not reached a terminal state.
    #[error("task {task_id} is not ready: {status} at {progress}")]
    NotReady {
        task_id: TaskId,
        status: TaskStatus,
        progress: Progress,
    },

    /// The task ended in failure.
    #[error("task {task_id} failed: {failure}")]
    Failed {
        task_id: TaskId,
        failure: TaskFailure,
    },
}

impl From<InvalidParcel> for OrchestratorError {
    fn from(err: InvalidParcel) -> Self {
        Self::InvalidInput {
            missing: err.missing,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Point-in-time view of a task for status polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: Progress,
    pub message: String,
    pub error: Option<TaskFailure>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&TaskRecord> for TaskStatusView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id(),
            status: record.status(),
            progress: record.progress(),
            message: record.message().to_string(),
            error: record.error().cloned(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
        }
    }
}

/// A completed task's input and result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedAnalysis {
    pub task_id: TaskId,
    pub parcel: LandParcel,
    pub result: AnalysisResult,
    pub created_at: Timestamp,
    pub completed_at: Timestamp,
}

/// One line of the task listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: Progress,
    pub created_at: Timestamp,
    pub address: String,
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id(),
            status: record.status(),
            progress: record.progress(),
            created_at: record.created_at(),
            address: record.parcel().address.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Creates tasks, launches their pipelines, and answers queries about them.
///
/// Cheap to clone; clones share the store and executor.
#[derive(Clone)]
pub struct TaskOrchestrator {
    store: Arc<dyn TaskStore>,
    executor: Arc<PipelineExecutor>,
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        knowledge: Arc<dyn KnowledgeCollaborator>,
        policy: Arc<dyn PolicyCollaborator>,
        config: ExecutorConfig,
    ) -> Self {
        let executor = PipelineExecutor::new(Arc::clone(&store), knowledge, policy, config);
        Self {
            store,
            executor: Arc::new(executor),
        }
    }

    /// Validates `submission`, creates a Pending task, and starts its pipeline.
    ///
    /// Returns as soon as the task exists. Must be called from within a Tokio
    /// runtime.
    pub fn submit(&self, submission: ParcelSubmission) -> Result<TaskId, OrchestratorError> {
        let parcel = submission.validate()?;
        let record = self.store.create(parcel);
        let task_id = record.id();
        info!(%task_id, address = %record.parcel().address, "analysis task created");

        let executor = Arc::clone(&self.executor);
        let run = tokio::spawn(async move { executor.run(task_id).await });

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match run.await {
                Ok(Ok(record)) => {
                    debug!(%task_id, status = %record.status(), "analysis run finished");
                }
                Ok(Err(err)) => {
                    error!(%task_id, error = %err, "analysis outcome could not be recorded");
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        format!("analysis panicked: {}", panic_message(join_error.into_panic()))
                    } else {
                        "analysis run was cancelled".to_string()
                    };
                    error!(%task_id, error = %message, "analysis run aborted");
                    record_abort(store.as_ref(), task_id, message);
                }
            }
        });

        Ok(task_id)
    }

    /// Current status, progress and message of a task.
    pub fn status(&self, task_id: TaskId) -> Result<TaskStatusView, OrchestratorError> {
        let record = self.lookup(task_id)?;
        Ok(TaskStatusView::from(&record))
    }

    /// The result of a completed task.
    pub fn result(&self, task_id: TaskId) -> Result<CompletedAnalysis, OrchestratorError> {
        let record = self.lookup(task_id)?;
        if let Some(failure) = record.error() {
            return Err(OrchestratorError::Failed {
                task_id,
                failure: failure.clone(),
            });
        }
        match record.result() {
            Some(result) => Ok(CompletedAnalysis {
                task_id,
                parcel: record.parcel().clone(),
                result: result.clone(),
                created_at: record.created_at(),
                completed_at: record.updated_at(),
            }),
            None => Err(OrchestratorError::NotReady {
                task_id,
                status: record.status(),
                progress: record.progress(),
            }),
        }
    }

    /// Every task, oldest first.
    pub fn list(&self) -> Vec<TaskSummary> {
        self.store.list().iter().map(TaskSummary::from).collect()
    }

    /// Number of tasks held in the store.
    pub fn task_count(&self) -> usize {
        self.store.len()
    }

    fn lookup(&self, task_id: TaskId) -> Result<TaskRecord, OrchestratorError> {
        self.store.get(task_id).map_err(|err| match err {
            StoreError::NotFound { task_id } => OrchestratorError::NotFound { task_id },
            // `get` never applies a transition.
            StoreError::Transition(transition) => OrchestratorError::NotFound {
                task_id: transition.task_id,
            },
        })
    }
}

/// Marks a task whose run died without recording an outcome as Failed.
fn record_abort(store: &dyn TaskStore, task_id: TaskId, message: String) {
    let now = Timestamp::now();
    let outcome = store.update(task_id, &mut |record: &mut TaskRecord| {
        let stage = Stage::in_progress_at(record.progress());
        record.fail(TaskFailure::internal(stage, message.clone()), now)
    });
    if let Err(err) = outcome {
        warn!(%task_id, error = %err, "aborted analysis could not be marked failed");
    }
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
