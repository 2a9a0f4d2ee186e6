//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::LmStudioClient;
use crate::orchestrator::{GenerationRequest, Orchestrator, ViewStatus};
use crate::store::InMemoryTaskStore;
use crate::tracker::JiraClient;
use crate::util::preview;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task lifecycle and external clients
    pub orchestrator: Orchestrator,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

fn json_rejection(route: &str, rejection: JsonRejection) -> ApiError {
    let detail = rejection.body_text();
    tracing::error!("Invalid request body for {}: {}", route, detail);
    api_error(rejection.status(), detail)
}

/// Wire the production clients and a fresh task store.
pub fn build_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let llm = Arc::new(LmStudioClient::new(&config.model)?);
    let tracker = Arc::new(JiraClient::new(&config.tracker)?);
    let store = Arc::new(InMemoryTaskStore::new());
    let orchestrator =
        Orchestrator::new(llm, tracker, store).with_summary_comment(config.summary_comment);
    Ok(Arc::new(AppState {
        config,
        orchestrator,
    }))
}

/// All routes with tracing and CORS layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/jira/epic/generate", post(generate_epic))
        .route("/api/v1/jira/epic/:key/status", get(epic_status))
        .route("/api/v1/requirements/validate", post(validate_requirements))
        .route("/api/v1/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = build_state(config)?;
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_state).await;
        })
        .await?;

    Ok(())
}

/// Wait for SIGINT/SIGTERM and report tasks that will be lost.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let in_flight = state.orchestrator.store().count_processing().await;
    if in_flight == 0 {
        tracing::info!("Shutdown signal received, no tasks in flight");
    } else {
        tracing::warn!(
            "Shutdown signal received, {} tasks still processing will be lost",
            in_flight
        );
    }
}

/// Accept an epic and start generating issues in the background.
async fn generate_epic(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EpicGenerateRequest>, JsonRejection>,
) -> Result<Json<EpicGenerateResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| json_rejection("epic generate", e))?;

    let epic_key = req.epic_key.trim().to_string();
    if epic_key.is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "epic_key must not be empty",
        ));
    }

    tracing::info!(
        "Received epic breakdown request for {} (input_chars={}): {}",
        epic_key,
        req.input.chars().count(),
        preview(&req.input, 100)
    );

    let model = req.model.filter(|m| !m.trim().is_empty());
    let task_id = state
        .orchestrator
        .submit(GenerationRequest {
            business_key: epic_key,
            input: req.input,
            model,
        })
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(EpicGenerateResponse {
        task_id,
        status: ViewStatus::Processing,
    }))
}

/// Latest task status for an epic; unknown epics report `not_found`.
async fn epic_status(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Json<EpicStatusResponse> {
    Json(state.orchestrator.query_status(&key).await.into())
}

/// Synchronous requirement review by the model.
async fn validate_requirements(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RequirementsValidateRequest>, JsonRejection>,
) -> Result<Json<RequirementsValidateResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| json_rejection("requirements validate", e))?;
    if req.text.trim().is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "text must not be empty",
        ));
    }

    let validation = state
        .orchestrator
        .validate_requirements(&req.text)
        .await
        .map_err(|e| {
            tracing::error!("Requirement validation failed: {}", e);
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    Ok(Json(RequirementsValidateResponse {
        text: req.text,
        validation,
    }))
}

/// Reachability of the tracker and the model endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.orchestrator.health().await.into())
}
