//! The pipeline executor: runs the ordered analysis stages for one task.
//!
//! # Stage order
//!
//! ```text
//! Normalize (10) -> KnowledgeAnalysis (50) -> PolicySearch (80) -> AssembleReport (100)
//! ```
//!
//! Each stage is a function returning `Result<_, StageFailure>` and the stages
//! are composed with `?`, so the first failure ends the run. The failure is
//! normalized into a [`TaskFailure`] and recorded on the task; no later stage
//! runs and nothing overwrites the recorded outcome.
//!
//! In [`CollaboratorMode::Concurrent`] the two collaborator stages run under
//! `tokio::try_join!`. The first error wins and the sibling future is dropped
//! without its outcome ever reaching the store. Progress writes use the task
//! record's max-merge, so the reported progress stays monotonic regardless of
//! which call finishes first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn, Instrument};

use pipeline::{
    assemble, CollaboratorError, KnowledgeCollaborator, LandParcel, PolicyCollaborator,
    PolicyRecord, RetryPolicy, Stage, StoreError, TaskFailure, TaskId, TaskRecord, TaskStore,
    Timestamp,
};

use crate::collaborators::{
    TimedKnowledge, TimedPolicy, DEFAULT_KNOWLEDGE_TIMEOUT, DEFAULT_POLICY_TIMEOUT,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default cap on the wait between collaborator attempts.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How the two collaborator stages are scheduled relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollaboratorMode {
    /// Knowledge analysis, then policy search.
    #[default]
    Sequential,
    /// Both calls in flight at once; the first failure ends the run.
    Concurrent,
}

/// Tuning knobs for [`PipelineExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Attempts per collaborator stage, including the first. Values below 1
    /// are treated as 1.
    pub max_attempts: u32,
    /// Wait between attempts when the error carries no provider hint.
    pub retry_backoff: Duration,
    /// Upper bound on any wait between attempts, including provider
    /// `Retry-After` hints.
    pub max_retry_delay: Duration,
    pub mode: CollaboratorMode,
    /// Bound on each knowledge collaborator attempt.
    pub knowledge_timeout: Duration,
    /// Bound on each policy collaborator attempt.
    pub policy_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_backoff: Duration::from_millis(500),
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            mode: CollaboratorMode::Sequential,
            knowledge_timeout: DEFAULT_KNOWLEDGE_TIMEOUT,
            policy_timeout: DEFAULT_POLICY_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage failures
// ---------------------------------------------------------------------------

/// Why a stage stopped the run.
#[derive(Debug)]
enum StageFailure {
    Collaborator {
        stage: Stage,
        error: CollaboratorError,
    },
    Store {
        stage: Stage,
        error: StoreError,
    },
}

impl StageFailure {
    fn into_task_failure(self) -> TaskFailure {
        match self {
            Self::Collaborator { stage, error } => TaskFailure::from_collaborator(stage, &error),
            Self::Store { stage, error } => {
                TaskFailure::internal(stage, format!("task store rejected update: {error}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Drives one task from Pending to a terminal state.
pub struct PipelineExecutor {
    store: Arc<dyn TaskStore>,
    knowledge: TimedKnowledge,
    policy: TimedPolicy,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    /// Builds an executor. Both collaborators are wrapped in the timeouts
    /// from `config`.
    pub fn new(
        store: Arc<dyn TaskStore>,
        knowledge: Arc<dyn KnowledgeCollaborator>,
        policy: Arc<dyn PolicyCollaborator>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            knowledge: TimedKnowledge::new(knowledge, config.knowledge_timeout),
            policy: TimedPolicy::new(policy, config.policy_timeout),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs every stage for `task_id` and returns the terminal record.
    ///
    /// Stage failures are recorded on the task and are not errors here. An
    /// `Err` means the store itself refused to record the outcome, e.g. the
    /// task does not exist or was already terminal.
    pub async fn run(&self, task_id: TaskId) -> Result<TaskRecord, StoreError> {
        let span = tracing::info_span!("analysis", task_id = %task_id);
        async move {
            match self.run_stages(task_id).await {
                Ok(record) => {
                    info!(
                        policies = record.result().map_or(0, |r| r.policies.len()),
                        "analysis completed"
                    );
                    Ok(record)
                }
                Err(failure) => {
                    let failure = failure.into_task_failure();
                    warn!(
                        kind = %failure.kind,
                        stage = %failure.stage,
                        error = %failure.message,
                        "analysis failed"
                    );
                    self.fail(task_id, failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Records `failure` on a Pending or Running task.
    pub fn fail(&self, task_id: TaskId, failure: TaskFailure) -> Result<TaskRecord, StoreError> {
        let now = Timestamp::now();
        self.store
            .update(task_id, &mut |record: &mut TaskRecord| {
                record.fail(failure.clone(), now)
            })
    }

    async fn run_stages(&self, task_id: TaskId) -> Result<TaskRecord, StageFailure> {
        let parcel = self.normalize(task_id)?;

        let (analysis, policies) = match self.config.mode {
            CollaboratorMode::Sequential => {
                let analysis = self.knowledge_analysis(task_id, &parcel).await?;
                let policies = self.policy_search(task_id, &parcel).await?;
                (analysis, policies)
            }
            CollaboratorMode::Concurrent => tokio::try_join!(
                self.knowledge_analysis(task_id, &parcel),
                self.policy_search(task_id, &parcel),
            )?,
        };

        self.assemble_report(task_id, &parcel, analysis, policies)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Claims the task and maps blank optional parcel fields to their
    /// defaults. The stored parcel keeps the submitted values; later stages
    /// work on the defaulted copy.
    fn normalize(&self, task_id: TaskId) -> Result<LandParcel, StageFailure> {
        let stage = Stage::Normalize;
        let now = Timestamp::now();
        let record = self
            .store
            .update(task_id, &mut |record: &mut TaskRecord| record.start(now))
            .map_err(|error| StageFailure::Store { stage, error })?;
        let parcel = record.parcel().clone().with_defaults();
        debug!(
            address = %parcel.address,
            land_category = %parcel.land_category,
            zoning_district = %parcel.zoning_district,
            "task claimed"
        );
        self.finish(task_id, stage)?;
        Ok(parcel)
    }

    async fn knowledge_analysis(
        &self,
        task_id: TaskId,
        parcel: &LandParcel,
    ) -> Result<String, StageFailure> {
        let stage = Stage::KnowledgeAnalysis;
        self.enter(task_id, stage)?;
        let analysis = self
            .with_retry(stage, || self.knowledge.analyze(parcel))
            .await?;
        self.finish(task_id, stage)?;
        Ok(analysis)
    }

    async fn policy_search(
        &self,
        task_id: TaskId,
        parcel: &LandParcel,
    ) -> Result<Vec<PolicyRecord>, StageFailure> {
        let stage = Stage::PolicySearch;
        self.enter(task_id, stage)?;
        let policies = self
            .with_retry(stage, || self.policy.find_policies(parcel))
            .await?;
        debug!(count = policies.len(), "policies found");
        self.finish(task_id, stage)?;
        Ok(policies)
    }

    fn assemble_report(
        &self,
        task_id: TaskId,
        parcel: &LandParcel,
        analysis: String,
        policies: Vec<PolicyRecord>,
    ) -> Result<TaskRecord, StageFailure> {
        let stage = Stage::AssembleReport;
        self.enter(task_id, stage)?;
        let now = Timestamp::now();
        let result = assemble(analysis, policies, parcel, now);
        self.store
            .update(task_id, &mut |record: &mut TaskRecord| {
                record.complete(result.clone(), now)
            })
            .map_err(|error| StageFailure::Store { stage, error })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Publishes the stage's running message without moving progress.
    fn enter(&self, task_id: TaskId, stage: Stage) -> Result<(), StageFailure> {
        debug!(%stage, "stage started");
        let now = Timestamp::now();
        self.store
            .update(task_id, &mut |record: &mut TaskRecord| {
                record.advance(record.progress(), stage.running_message(), now)
            })
            .map(|_| ())
            .map_err(|error| StageFailure::Store { stage, error })
    }

    /// Moves progress to the stage's checkpoint.
    fn finish(&self, task_id: TaskId, stage: Stage) -> Result<(), StageFailure> {
        let now = Timestamp::now();
        let record = self
            .store
            .update(task_id, &mut |record: &mut TaskRecord| {
                record.advance(stage.checkpoint(), stage.finished_message(), now)
            })
            .map_err(|error| StageFailure::Store { stage, error })?;
        debug!(%stage, progress = %record.progress(), "stage finished");
        Ok(())
    }

    /// Calls a collaborator, re-attempting while the error is retryable and
    /// the attempt budget allows. Waits never exceed `max_retry_delay`.
    async fn with_retry<T, F, Fut>(&self, stage: Stage, mut call: F) -> Result<T, StageFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let delay = match error.retry_policy() {
                RetryPolicy::Retryable { after } if attempt < max_attempts => after
                    .unwrap_or(self.config.retry_backoff)
                    .min(self.config.max_retry_delay),
                _ => return Err(StageFailure::Collaborator { stage, error }),
            };

            warn!(
                %stage,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "collaborator call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
