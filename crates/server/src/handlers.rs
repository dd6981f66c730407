//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use orchestrator::{OrchestratorError, TaskStatusView};
use pipeline::{ParcelSubmission, ScoreSubmission, TaskId, Timestamp};

use crate::demo::demo_submission;
use crate::error::ApiError;
use crate::render;
use crate::AppState;

/// Body of `POST /api/analyze`.
///
/// The wrapped form carries the parcel and its scores side by side; the flat
/// form is the parcel object itself. A top-level `land_data` key selects the
/// wrapped form, and field errors are reported against whichever form was
/// selected.
#[derive(Debug)]
pub enum AnalyzeRequest {
    Wrapped {
        land_data: ParcelSubmission,
        analyze_data: Option<ScoreSubmission>,
    },
    Flat(ParcelSubmission),
}

#[derive(Deserialize)]
struct WrappedBody {
    land_data: ParcelSubmission,
    #[serde(default)]
    analyze_data: Option<ScoreSubmission>,
}

impl AnalyzeRequest {
    pub fn from_value(body: Value) -> Result<Self, serde_json::Error> {
        if body.get("land_data").is_some() {
            let WrappedBody {
                land_data,
                analyze_data,
            } = serde_json::from_value(body)?;
            Ok(Self::Wrapped {
                land_data,
                analyze_data,
            })
        } else {
            serde_json::from_value(body).map(Self::Flat)
        }
    }

    pub fn into_submission(self) -> ParcelSubmission {
        match self {
            Self::Wrapped {
                mut land_data,
                analyze_data,
            } => {
                if analyze_data.is_some() {
                    land_data.scores = analyze_data;
                }
                land_data
            }
            Self::Flat(submission) => submission,
        }
    }
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    TaskId::parse(raw).ok_or_else(|| ApiError::UnknownTaskId(raw.to_string()))
}

fn task_urls(task_id: TaskId) -> Value {
    json!({
        "status_url": format!("/api/status/{task_id}"),
        "result_url": format!("/result/{task_id}"),
        "loading_url": format!("/loading/{task_id}"),
    })
}

// ---------------------------------------------------------------------------
// JSON API
// ---------------------------------------------------------------------------

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected analysis request body");
        ApiError::InvalidBody(rejection.body_text())
    })?;
    let request = AnalyzeRequest::from_value(body).map_err(|err| {
        warn!(error = %err, "analysis request body does not match a parcel form");
        ApiError::InvalidBody(err.to_string())
    })?;

    let task_id = state
        .orchestrator
        .submit(request.into_submission())
        .inspect_err(|err| warn!(error = %err, "rejected analysis submission"))?;
    info!(%task_id, "analysis accepted");

    let mut body = json!({
        "task_id": task_id,
        "status": "processing",
        "message": "Analysis started",
    });
    merge(&mut body, task_urls(task_id));
    Ok((StatusCode::ACCEPTED, Json(body)))
}

pub async fn status(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<TaskStatusView>, ApiError> {
    let task_id = parse_task_id(&raw)?;
    Ok(Json(state.orchestrator.status(task_id)?))
}

pub async fn result_json(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task_id = parse_task_id(&raw)?;
    let analysis = state.orchestrator.result(task_id)?;
    Ok(Json(json!({
        "task_id": analysis.task_id,
        "status": "completed",
        "land_data": analysis.parcel,
        "result": analysis.result,
        "created_at": analysis.created_at,
        "completed_at": analysis.completed_at,
    })))
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    let tasks: Vec<Value> = state
        .orchestrator
        .list()
        .into_iter()
        .map(|task| {
            json!({
                "task_id": task.task_id,
                "status": task.status,
                "progress": task.progress,
                "created_at": task.created_at,
                "land_address": task.address,
            })
        })
        .collect();
    Json(json!({
        "total_tasks": tasks.len(),
        "tasks": tasks,
    }))
}

pub async fn demo_start(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let task_id = state.orchestrator.submit(demo_submission())?;
    info!(%task_id, "demo analysis started");
    let mut body = json!({
        "task_id": task_id,
        "status": "processing",
        "message": "Demo analysis started",
        "total_tasks": state.orchestrator.task_count(),
    });
    merge(&mut body, task_urls(task_id));
    Ok(Json(body))
}

pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Asynchronous land-parcel analysis with expert commentary and support-policy search",
        "endpoints": {
            "POST /api/analyze": "Start a parcel analysis",
            "GET /api/status/{task_id}": "Analysis status and progress",
            "GET /api/result/{task_id}": "Analysis result as JSON",
            "GET /result/{task_id}": "Analysis report as HTML",
            "GET /loading/{task_id}": "Progress page",
            "GET /api/tasks": "All tasks",
            "GET /health": "Health check",
            "GET /demo/start": "Start the demo analysis",
        },
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Timestamp::now(),
        "active_tasks": state.orchestrator.task_count(),
    }))
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}

// ---------------------------------------------------------------------------
// HTML pages
// ---------------------------------------------------------------------------

pub async fn result_html(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(task_id) = TaskId::parse(&raw) else {
        return not_found_page();
    };
    match state.orchestrator.result(task_id) {
        Ok(analysis) => Html(render::report_page(&analysis)).into_response(),
        Err(OrchestratorError::NotFound { .. }) => not_found_page(),
        Err(OrchestratorError::NotReady { progress, .. }) => (
            StatusCode::CONFLICT,
            Html(render::message_page(
                "Analysis in progress",
                &format!("The analysis is {progress} complete. Reload this page shortly."),
            )),
        )
            .into_response(),
        Err(OrchestratorError::Failed { failure, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(render::message_page("Analysis failed", &failure.to_string())),
        )
            .into_response(),
        Err(err @ OrchestratorError::InvalidInput { .. }) => ApiError::from(err).into_response(),
    }
}

pub async fn loading(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    match TaskId::parse(&raw).map(|id| (id, state.orchestrator.status(id))) {
        Some((task_id, Ok(_))) => Html(render::loading_page(task_id)).into_response(),
        _ => not_found_page(),
    }
}

fn not_found_page() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(render::message_page(
            "Task not found",
            "No analysis exists with this id.",
        )),
    )
        .into_response()
}
