//! Shared stubs and helpers for the orchestrator integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use orchestrator::{
    CollaboratorMode, ExecutorConfig, InMemoryTaskStore, TaskOrchestrator, TaskStatusView,
};
use pipeline::{
    CollaboratorError, KnowledgeCollaborator, LandParcel, ParcelSubmission, PolicyCollaborator,
    PolicyRecord, StoreError, TaskId, TaskMutator, TaskRecord, TaskStore,
};

// ---------------------------------------------------------------------------
// Collaborator stubs
// ---------------------------------------------------------------------------

/// Replays scripted outcomes, then repeats `fallback` forever.
pub struct Scripted<T> {
    delay: Duration,
    script: Mutex<VecDeque<Result<T, CollaboratorError>>>,
    fallback: Result<T, CollaboratorError>,
    calls: AtomicUsize,
    panics: bool,
}

impl<T: Clone> Scripted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(value),
            calls: AtomicUsize::new(0),
            panics: false,
        }
    }

    pub fn err(error: CollaboratorError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::ok_placeholder()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::ok_placeholder()
        }
    }

    fn ok_placeholder() -> Self {
        Self {
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: Err(CollaboratorError::invalid_response(
                pipeline::Collaborator::Knowledge,
                "unscripted",
            )),
            calls: AtomicUsize::new(0),
            panics: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Outcomes returned, in order, before the fallback applies.
    pub fn then_script(self, outcomes: Vec<Result<T, CollaboratorError>>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<T, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("collaborator exploded");
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl KnowledgeCollaborator for Scripted<String> {
    async fn analyze(&self, _parcel: &LandParcel) -> Result<String, CollaboratorError> {
        self.next().await
    }
}

#[async_trait]
impl PolicyCollaborator for Scripted<Vec<PolicyRecord>> {
    async fn find_policies(
        &self,
        _parcel: &LandParcel,
    ) -> Result<Vec<PolicyRecord>, CollaboratorError> {
        self.next().await
    }
}

pub fn policies(n: usize) -> Vec<PolicyRecord> {
    (1..=n)
        .map(|i| PolicyRecord {
            name: format!("Daegu support program {i}"),
            description: format!("Funding for commercial district renewal, round {i}"),
            organization: Some("Daegu Metropolitan City".into()),
            application_period: Some("2026-09-01 ~ 2026-12-31".into()),
            details_url: Some(format!("https://www.bizinfo.go.kr/policy/{i}")),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Recording store
// ---------------------------------------------------------------------------

/// Delegates to [`InMemoryTaskStore`] and keeps every committed record.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryTaskStore,
    history: Mutex<Vec<TaskRecord>>,
}

impl RecordingStore {
    pub fn history(&self, task_id: TaskId) -> Vec<TaskRecord> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id() == task_id)
            .cloned()
            .collect()
    }
}

impl TaskStore for RecordingStore {
    fn create(&self, parcel: LandParcel) -> TaskRecord {
        let record = self.inner.create(parcel);
        self.history.lock().unwrap().push(record.clone());
        record
    }

    fn get(&self, task_id: TaskId) -> Result<TaskRecord, StoreError> {
        self.inner.get(task_id)
    }

    fn update(&self, task_id: TaskId, mutator: TaskMutator<'_>) -> Result<TaskRecord, StoreError> {
        let record = self.inner.update(task_id, mutator)?;
        self.history.lock().unwrap().push(record.clone());
        Ok(record)
    }

    fn list(&self) -> Vec<TaskRecord> {
        self.inner.list()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// The Dongin-dong 1-ga, Jung-gu, Daegu demo parcel.
pub fn daegu() -> ParcelSubmission {
    ParcelSubmission {
        address: Some("Dongin-dong 1-ga 2-1, Jung-gu, Daegu".into()),
        land_category: Some("building site".into()),
        zoning: Some("central commercial".into()),
        land_use: Some("business".into()),
        terrain: Some("flat".into()),
        shape: Some("vertical rectangle".into()),
        road_frontage: Some("wide road corner".into()),
        unit_price: Some(3_735_000),
        ..ParcelSubmission::default()
    }
}

pub fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        retry_backoff: Duration::from_millis(1),
        ..ExecutorConfig::default()
    }
}

pub fn concurrent(config: ExecutorConfig) -> ExecutorConfig {
    ExecutorConfig {
        mode: CollaboratorMode::Concurrent,
        ..config
    }
}

pub fn new_orchestrator(
    knowledge: Arc<Scripted<String>>,
    policy: Arc<Scripted<Vec<PolicyRecord>>>,
    config: ExecutorConfig,
) -> TaskOrchestrator {
    new_orchestrator_with_store(Arc::new(InMemoryTaskStore::new()), knowledge, policy, config)
}

/// Builds an orchestrator over a store the test keeps a handle to.
pub fn new_orchestrator_with_store(
    store: Arc<dyn TaskStore>,
    knowledge: Arc<Scripted<String>>,
    policy: Arc<Scripted<Vec<PolicyRecord>>>,
    config: ExecutorConfig,
) -> TaskOrchestrator {
    TaskOrchestrator::new(store, knowledge, policy, config)
}

/// Polls until the task is terminal, returning every observed view.
pub async fn poll_until_terminal(
    orchestrator: &TaskOrchestrator,
    task_id: TaskId,
) -> Vec<TaskStatusView> {
    let mut seen = Vec::new();
    for _ in 0..1_000 {
        let view = orchestrator.status(task_id).unwrap();
        let done = view.status.is_terminal();
        seen.push(view);
        if done {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} did not reach a terminal state");
}
