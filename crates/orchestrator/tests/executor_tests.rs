//! Integration tests for the pipeline executor, driven directly without the
//! orchestrator's spawn.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{concurrent, daegu, fast_config, policies, RecordingStore, Scripted};
use orchestrator::{ExecutorConfig, PipelineExecutor};
use pipeline::{
    Collaborator, CollaboratorError, FailureKind, Progress, Stage, StoreError, TaskFailure,
    TaskId, TaskStatus, TaskStore,
};

fn executor(
    store: Arc<RecordingStore>,
    knowledge: Scripted<String>,
    policy: Scripted<Vec<pipeline::PolicyRecord>>,
    config: ExecutorConfig,
) -> PipelineExecutor {
    PipelineExecutor::new(store, Arc::new(knowledge), Arc::new(policy), config)
}

#[tokio::test]
async fn stages_publish_checkpoints_in_order() {
    let store = Arc::new(RecordingStore::default());
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()),
        Scripted::ok(policies(2)),
        fast_config(),
    );
    let id = store.create(daegu().validate().unwrap()).id();

    let record = exec.run(id).await.unwrap();
    assert_eq!(record.status(), TaskStatus::Completed);

    let history = store.history(id);
    let progress: Vec<u8> = history.iter().map(|r| r.progress().as_u8()).collect();
    let mut checkpoints = progress.clone();
    checkpoints.dedup();
    assert_eq!(checkpoints, vec![0, 10, 50, 80, 100]);

    let messages: Vec<&str> = history.iter().map(|r| r.message()).collect();
    for stage in [Stage::KnowledgeAnalysis, Stage::PolicySearch, Stage::AssembleReport] {
        assert!(
            messages.contains(&stage.running_message()),
            "no running message for {stage}"
        );
    }
    assert_eq!(messages.last().copied(), Some("Analysis complete"));
}

#[tokio::test]
async fn normalize_defaults_blank_classification_for_later_stages() {
    let store = Arc::new(RecordingStore::default());
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()),
        Scripted::ok(policies(1)),
        fast_config(),
    );
    let id = store.create(daegu().validate().unwrap()).id();

    let record = exec.run(id).await.unwrap();
    let report = &record.result().unwrap().markdown_report;
    assert!(report.contains("| Zoning district | not designated |"), "{report}");
    assert!(report.contains("| Land category | building site |"), "{report}");
    // The stored parcel keeps what was submitted.
    assert_eq!(record.parcel().zoning_district, "");
}

#[tokio::test]
async fn concurrent_mode_keeps_progress_monotonic() {
    let store = Arc::new(RecordingStore::default());
    // Policy finishes first, so its checkpoint (80) lands before knowledge's (50).
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()).with_delay(Duration::from_millis(60)),
        Scripted::ok(policies(1)),
        concurrent(fast_config()),
    );
    let id = store.create(daegu().validate().unwrap()).id();

    let record = exec.run(id).await.unwrap();
    assert_eq!(record.status(), TaskStatus::Completed);

    let progress: Vec<Progress> = store.history(id).iter().map(|r| r.progress()).collect();
    for pair in progress.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {progress:?}");
    }
}

#[tokio::test]
async fn failure_stops_later_stages() {
    let store = Arc::new(RecordingStore::default());
    let policy = Scripted::ok(policies(1));
    let exec = PipelineExecutor::new(
        Arc::clone(&store) as Arc<dyn TaskStore>,
        Arc::new(Scripted::<String>::err(CollaboratorError::unavailable(
            Collaborator::Knowledge,
            "connection refused",
        ))),
        Arc::new(policy),
        fast_config(),
    );
    let id = store.create(daegu().validate().unwrap()).id();

    let record = exec.run(id).await.unwrap();
    assert_eq!(record.status(), TaskStatus::Failed);
    let failure = record.error().unwrap();
    assert_eq!(failure.kind, FailureKind::CollaboratorUnavailable);
    assert_eq!(failure.stage, Stage::KnowledgeAnalysis);
    assert!(store
        .history(id)
        .iter()
        .all(|r| r.message() != Stage::PolicySearch.running_message()));
}

#[tokio::test]
async fn unknown_task_is_reported_to_the_caller() {
    let store = Arc::new(RecordingStore::default());
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()),
        Scripted::ok(policies(1)),
        fast_config(),
    );
    let id = TaskId::new_random();
    assert_eq!(
        exec.run(id).await.unwrap_err(),
        StoreError::NotFound { task_id: id }
    );
}

#[tokio::test]
async fn completed_task_cannot_be_failed_afterwards() {
    let store = Arc::new(RecordingStore::default());
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()),
        Scripted::ok(policies(1)),
        fast_config(),
    );
    let id = store.create(daegu().validate().unwrap()).id();
    exec.run(id).await.unwrap();

    let err = exec
        .fail(id, TaskFailure::internal(Stage::AssembleReport, "late"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Transition(_)));
    assert_eq!(store.get(id).unwrap().status(), TaskStatus::Completed);
}

#[tokio::test]
async fn second_run_of_the_same_task_is_rejected() {
    let store = Arc::new(RecordingStore::default());
    let exec = executor(
        Arc::clone(&store),
        Scripted::ok("analysis".to_string()),
        Scripted::ok(policies(1)),
        fast_config(),
    );
    let id = store.create(daegu().validate().unwrap()).id();
    exec.run(id).await.unwrap();

    // The claim fails, and recording that failure is itself refused because
    // the task is already terminal.
    assert!(matches!(
        exec.run(id).await,
        Err(StoreError::Transition(_))
    ));
    assert_eq!(store.get(id).unwrap().status(), TaskStatus::Completed);
}
