//! The task record and its state machine.
//!
//! # State Machine
//!
//! ```text
//! Pending   -> Running, Failed
//! Running   -> Running (progress advance), Completed, Failed
//! Completed -> (terminal, no transitions)
//! Failed    -> (terminal, no transitions)
//! ```
//!
//! The result and the failure are carried inside the terminal variants of
//! [`TaskState`], so a record can never hold both, and can hold neither only
//! while it is still Pending or Running.

use serde::{Deserialize, Serialize};

use crate::errors::{TaskFailure, TransitionError};
use crate::parcel::LandParcel;
use crate::report::AnalysisResult;
use crate::types::{Progress, Timestamp};
use crate::TaskId;

/// Lifecycle status of a task, as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One ordered unit of work within the analysis pipeline.
///
/// The order is fixed; [`Stage::ALL`] lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Claim the task and map optional parcel fields to their defaults.
    Normalize,
    /// Ask the knowledge collaborator for the professional analysis.
    KnowledgeAnalysis,
    /// Ask the policy collaborator for candidate support policies.
    PolicySearch,
    /// Merge everything into the final report.
    AssembleReport,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::Normalize,
        Stage::KnowledgeAnalysis,
        Stage::PolicySearch,
        Stage::AssembleReport,
    ];

    /// Progress reached once this stage has finished successfully.
    pub fn checkpoint(self) -> Progress {
        let value = match self {
            Self::Normalize => 10,
            Self::KnowledgeAnalysis => 50,
            Self::PolicySearch => 80,
            Self::AssembleReport => 100,
        };
        Progress::new(value).unwrap_or(Progress::COMPLETE)
    }

    /// The stage that is under way when a task has reached `progress`.
    ///
    /// Used to attribute failures that are detected outside the stage code,
    /// such as a panic observed by the supervisor.
    pub fn in_progress_at(progress: Progress) -> Stage {
        Self::ALL
            .into_iter()
            .find(|stage| stage.checkpoint() > progress)
            .unwrap_or(Stage::AssembleReport)
    }

    /// Status message shown to pollers while this stage is running.
    pub fn running_message(self) -> &'static str {
        match self {
            Self::Normalize => "Parsing parcel data",
            Self::KnowledgeAnalysis => "Running expert land analysis",
            Self::PolicySearch => "Searching related support policies",
            Self::AssembleReport => "Assembling the analysis report",
        }
    }

    /// Status message shown once this stage has finished.
    pub fn finished_message(self) -> &'static str {
        match self {
            Self::Normalize => "Parcel data parsed",
            Self::KnowledgeAnalysis => "Expert land analysis finished",
            Self::PolicySearch => "Support policy search finished",
            Self::AssembleReport => "Analysis complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normalize => "normalize",
            Self::KnowledgeAnalysis => "knowledge_analysis",
            Self::PolicySearch => "policy_search",
            Self::AssembleReport => "assemble_report",
        };
        f.write_str(s)
    }
}

/// Internal lifecycle state. Terminal variants carry their payload.
#[derive(Debug, Clone, PartialEq)]
enum TaskState {
    Pending,
    Running,
    Completed(Box<AnalysisResult>),
    Failed(TaskFailure),
}

/// A submitted analysis and its tracked lifecycle.
///
/// Records are owned by a [`TaskStore`](crate::TaskStore); everything else
/// works on clones and mutates only through the store's atomic update.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    id: TaskId,
    parcel: LandParcel,
    state: TaskState,
    progress: Progress,
    message: String,
    created_at: Timestamp,
    updated_at: Timestamp,
}

/// Message recorded on a freshly created task.
pub const QUEUED_MESSAGE: &str = "Analysis queued";

impl TaskRecord {
    /// Creates a Pending record with zero progress.
    pub fn new(id: TaskId, parcel: LandParcel, now: Timestamp) -> Self {
        Self {
            id,
            parcel,
            state: TaskState::Pending,
            progress: Progress::ZERO,
            message: QUEUED_MESSAGE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn parcel(&self) -> &LandParcel {
        &self.parcel
    }

    pub fn status(&self) -> TaskStatus {
        match self.state {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Running => TaskStatus::Running,
            TaskState::Completed(_) => TaskStatus::Completed,
            TaskState::Failed(_) => TaskStatus::Failed,
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// The assembled result; `Some` only when Completed.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            TaskState::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// The recorded failure; `Some` only when Failed.
    pub fn error(&self) -> Option<&TaskFailure> {
        match &self.state {
            TaskState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Pending → Running. Called once by the executor when it claims the task.
    pub fn start(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.require(TaskStatus::Pending, TaskStatus::Running, None)?;
        self.state = TaskState::Running;
        self.message = Stage::Normalize.running_message().to_string();
        self.updated_at = now;
        Ok(())
    }

    /// Records progress and a new stage message on a Running task.
    ///
    /// Progress is merged with `max`: a value lower than the current one
    /// leaves progress where it is, so concurrent stages finishing out of
    /// order can never move it backwards.
    pub fn advance(
        &mut self,
        progress: Progress,
        message: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.require(
            TaskStatus::Running,
            TaskStatus::Running,
            Some("progress update"),
        )?;
        self.progress = self.progress.max(progress);
        self.message = message.into();
        self.updated_at = now;
        Ok(())
    }

    /// Running → Completed with the assembled result.
    pub fn complete(&mut self, result: AnalysisResult, now: Timestamp) -> Result<(), TransitionError> {
        self.require(TaskStatus::Running, TaskStatus::Completed, None)?;
        self.state = TaskState::Completed(Box::new(result));
        self.progress = Progress::COMPLETE;
        self.message = Stage::AssembleReport.finished_message().to_string();
        self.updated_at = now;
        Ok(())
    }

    /// Pending or Running → Failed. Progress stays where the failure happened.
    pub fn fail(&mut self, failure: TaskFailure, now: Timestamp) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(self.rejection(TaskStatus::Failed, None));
        }
        self.message = format!("Analysis failed: {}", failure.message);
        self.state = TaskState::Failed(failure);
        self.updated_at = now;
        Ok(())
    }

    fn require(
        &self,
        expected: TaskStatus,
        to: TaskStatus,
        detail: Option<&str>,
    ) -> Result<(), TransitionError> {
        if self.status() == expected {
            Ok(())
        } else {
            Err(self.rejection(to, detail))
        }
    }

    fn rejection(&self, to: TaskStatus, detail: Option<&str>) -> TransitionError {
        TransitionError {
            task_id: self.id,
            from: self.status(),
            to,
            detail: detail.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::parcel::ParcelSubmission;
    use crate::report::assemble;
    use pretty_assertions::assert_eq;

    fn parcel() -> LandParcel {
        ParcelSubmission {
            address: Some("Jung-gu, Daegu".into()),
            zoning: Some("central commercial".into()),
            land_use: Some("business".into()),
            terrain: Some("flat".into()),
            shape: Some("rectangle".into()),
            road_frontage: Some("wide road".into()),
            unit_price: Some(3_735_000),
            ..ParcelSubmission::default()
        }
        .validate()
        .unwrap()
    }

    fn record() -> TaskRecord {
        TaskRecord::new(TaskId::new_random(), parcel(), Timestamp::now())
    }

    fn progress(value: u8) -> Progress {
        Progress::new(value).unwrap()
    }

    #[test]
    fn new_record_is_pending_without_outcome() {
        let record = record();
        assert_eq!(record.status(), TaskStatus::Pending);
        assert_eq!(record.progress(), Progress::ZERO);
        assert_eq!(record.message(), QUEUED_MESSAGE);
        assert!(record.result().is_none());
        assert!(record.error().is_none());
    }

    #[test]
    fn advance_requires_running() {
        let mut record = record();
        let err = record
            .advance(progress(10), "x", Timestamp::now())
            .unwrap_err();
        assert_eq!(err.from, TaskStatus::Pending);
        assert_eq!(record.progress(), Progress::ZERO);
    }

    #[test]
    fn advance_never_lowers_progress() {
        let mut record = record();
        record.start(Timestamp::now()).unwrap();
        record.advance(progress(80), "policies", Timestamp::now()).unwrap();
        record.advance(progress(50), "knowledge", Timestamp::now()).unwrap();
        assert_eq!(record.progress(), progress(80));
        assert_eq!(record.message(), "knowledge");
    }

    #[test]
    fn complete_sets_result_and_full_progress() {
        let mut record = record();
        record.start(Timestamp::now()).unwrap();
        let result = assemble("text", Vec::new(), record.parcel(), Timestamp::now());
        record.complete(result, Timestamp::now()).unwrap();
        assert_eq!(record.status(), TaskStatus::Completed);
        assert_eq!(record.progress(), Progress::COMPLETE);
        assert!(record.result().is_some());
        assert!(record.error().is_none());
    }

    #[test]
    fn complete_from_pending_is_rejected() {
        let mut record = record();
        let result = assemble("text", Vec::new(), record.parcel(), Timestamp::now());
        let err = record.complete(result, Timestamp::now()).unwrap_err();
        assert_eq!(err.to, TaskStatus::Completed);
        assert_eq!(record.status(), TaskStatus::Pending);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut record = record();
        record.start(Timestamp::now()).unwrap();
        record
            .fail(
                TaskFailure::internal(Stage::KnowledgeAnalysis, "boom"),
                Timestamp::now(),
            )
            .unwrap();

        assert!(record.start(Timestamp::now()).is_err());
        assert!(record.advance(progress(90), "x", Timestamp::now()).is_err());
        let result = assemble("text", Vec::new(), record.parcel(), Timestamp::now());
        assert!(record.complete(result, Timestamp::now()).is_err());
        assert!(record
            .fail(TaskFailure::internal(Stage::PolicySearch, "again"), Timestamp::now())
            .is_err());

        let failure = record.error().unwrap();
        assert_eq!(failure.kind, FailureKind::Internal);
        assert_eq!(failure.message, "boom");
        assert!(record.result().is_none());
    }

    #[test]
    fn stage_checkpoints_increase_in_order() {
        let checkpoints: Vec<u8> = Stage::ALL.iter().map(|s| s.checkpoint().as_u8()).collect();
        assert_eq!(checkpoints, vec![10, 50, 80, 100]);
    }

    #[test]
    fn in_progress_stage_follows_last_checkpoint() {
        assert_eq!(Stage::in_progress_at(Progress::ZERO), Stage::Normalize);
        assert_eq!(Stage::in_progress_at(progress(10)), Stage::KnowledgeAnalysis);
        assert_eq!(Stage::in_progress_at(progress(50)), Stage::PolicySearch);
        assert_eq!(Stage::in_progress_at(progress(80)), Stage::AssembleReport);
        assert_eq!(Stage::in_progress_at(Progress::COMPLETE), Stage::AssembleReport);
    }
}
