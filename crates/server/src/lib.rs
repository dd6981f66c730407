//! ParcelScope HTTP boundary.
//!
//! Exposes the [`orchestrator::TaskOrchestrator`] over HTTP/JSON with axum.
//! Submission returns `202 Accepted` with the task id at once; callers poll
//! the status route and fetch the result as JSON or as a rendered HTML
//! report.
//!
//! ## Routes
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/analyze` | submit a parcel |
//! | GET | `/api/status/{task_id}` | status view |
//! | GET | `/api/result/{task_id}` | completed result as JSON |
//! | GET | `/result/{task_id}` | completed result as HTML |
//! | GET | `/loading/{task_id}` | polling progress page |
//! | GET | `/api/tasks` | all tasks |
//! | GET | `/demo/start` | submit the demo parcel |
//! | GET | `/` | service info |
//! | GET | `/health` | liveness and task count |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Routing, body decoding, status-code mapping and HTML
//! rendering live here. Nothing in this crate touches task state except
//! through the orchestrator.

mod demo;
mod error;
mod handlers;
mod render;

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use orchestrator::TaskOrchestrator;

pub use demo::demo_submission;
pub use error::ApiError;
pub use handlers::AnalyzeRequest;
pub use render::markdown_to_html;

/// Default service name reported by `/` and `/health`.
pub const SERVICE_NAME: &str = "ParcelScope land analysis service";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: TaskOrchestrator,
    pub service_name: String,
}

impl AppState {
    pub fn new(orchestrator: TaskOrchestrator) -> Self {
        Self {
            orchestrator,
            service_name: SERVICE_NAME.to_string(),
        }
    }
}

/// Builds the router with tracing and permissive CORS.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/status/{task_id}", get(handlers::status))
        .route("/api/result/{task_id}", get(handlers::result_json))
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/result/{task_id}", get(handlers::result_html))
        .route("/loading/{task_id}", get(handlers::loading))
        .route("/demo/start", get(handlers::demo_start))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
