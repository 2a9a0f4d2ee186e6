//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::{HealthReport, TaskView, ViewStatus};

/// Request to break an epic down into issues.
#[derive(Debug, Clone, Deserialize)]
pub struct EpicGenerateRequest {
    /// Optional model override (uses the configured default if absent or empty)
    #[serde(default)]
    pub model: Option<String>,

    /// Epic description handed to the model
    #[serde(default)]
    pub input: String,

    /// Epic key the generated issues are attached to
    pub epic_key: String,
}

/// Response after accepting a generation request.
#[derive(Debug, Clone, Serialize)]
pub struct EpicGenerateResponse {
    /// Unique task identifier
    pub task_id: Uuid,

    /// Always `processing` at submission time
    pub status: ViewStatus,
}

/// Status of the latest task for an epic.
#[derive(Debug, Clone, Serialize)]
pub struct EpicStatusResponse {
    pub key: String,
    pub status: ViewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_issues: Option<Vec<String>>,
}

impl From<TaskView> for EpicStatusResponse {
    fn from(view: TaskView) -> Self {
        Self {
            key: view.key,
            status: view.status,
            result: view.result,
            created_issues: view.created_issues,
        }
    }
}

/// Request to review a requirement.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementsValidateRequest {
    pub text: String,
}

/// Model verdict on a requirement.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementsValidateResponse {
    pub text: String,
    pub validation: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy` when both services answer, `degraded` otherwise
    pub status: String,

    /// `connected` or `unreachable`
    pub jira: String,

    /// `connected` or `unreachable`
    pub lm_studio: String,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        let connectivity = |up: bool| (if up { "connected" } else { "unreachable" }).to_string();
        let status = if report.is_healthy() {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            jira: connectivity(report.tracker),
            lm_studio: connectivity(report.model),
        }
    }
}

/// Error body, `{"detail": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
