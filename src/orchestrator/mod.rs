//! Epic generation orchestrator.
//!
//! ## Task Flow
//! 1. `submit` stores a `processing` record and returns its id immediately
//! 2. A detached tokio task builds the prompt and calls the model
//! 3. The answer is parsed into work items
//! 4. Items are created in the tracker under the epic, stopping at the first failure
//! 5. Exactly one terminal write records `completed` or `failed`
//!
//! Status is looked up by business key (the epic), never by task id. When
//! several tasks share a key the most recently submitted one is reported.
//!
//! No store lock is held across model or tracker calls.

pub mod prompt;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::{LlmClient, LlmError};
use crate::parser::{parse_work_items, ParseError};
use crate::store::{StoreError, TaskOutcome, TaskRecord, TaskStatus, TaskStore};
use crate::tracker::{TrackerClient, TrackerError};
use crate::util::preview;

/// A request to break an epic down into issues.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Epic key the created issues are attached to, e.g. `PROJ-123`
    pub business_key: String,
    /// Free-form epic description
    pub input: String,
    /// Model override; `None` uses the endpoint default
    pub model: Option<String>,
}

/// Why a pipeline run failed. Rendered into the task's `result`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model request failed: {0}")]
    Model(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Issue creation failed: {}", describe_tracker_failure(.0))]
    Tracker(#[from] TrackerError),

    #[error("Pipeline aborted: {0}")]
    Aborted(String),
}

fn describe_tracker_failure(err: &TrackerError) -> String {
    match err {
        TrackerError::ItemFailed { created, .. } if !created.is_empty() => format!(
            "{}; already created and not rolled back: {}",
            err,
            created.join(", ")
        ),
        _ => err.to_string(),
    }
}

/// Status reported for a business key.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Processing,
    Completed,
    Failed,
    NotFound,
}

impl From<TaskStatus> for ViewStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Processing => ViewStatus::Processing,
            TaskStatus::Completed => ViewStatus::Completed,
            TaskStatus::Failed => ViewStatus::Failed,
        }
    }
}

/// What a status query sees.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskView {
    pub key: String,
    pub status: ViewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Present only on completed tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_issues: Option<Vec<String>>,
}

impl TaskView {
    pub fn not_found(key: &str) -> Self {
        Self {
            key: key.to_string(),
            status: ViewStatus::NotFound,
            result: None,
            created_issues: None,
        }
    }

    fn from_record(record: TaskRecord) -> Self {
        let created_issues = match record.status {
            TaskStatus::Completed => Some(record.created_issue_keys),
            _ => None,
        };
        Self {
            key: record.business_key,
            status: record.status.into(),
            result: record.result,
            created_issues,
        }
    }
}

/// Reachability of both external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub tracker: bool,
    pub model: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.tracker && self.model
    }
}

/// Project portion of an issue key: `PROJ-123` -> `PROJ`.
///
/// A key without `-` is used whole.
pub fn project_key(business_key: &str) -> &str {
    business_key
        .split_once('-')
        .map_or(business_key, |(project, _)| project)
}

/// Owns the task lifecycle. Cheap to clone; all state is behind `Arc`s.
#[derive(Clone)]
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    tracker: Arc<dyn TrackerClient>,
    store: Arc<dyn TaskStore>,
    summary_comment: bool,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tracker: Arc<dyn TrackerClient>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            llm,
            tracker,
            store,
            summary_comment: false,
        }
    }

    /// Post a comment on the epic listing created issues after each successful run.
    pub fn with_summary_comment(mut self, enabled: bool) -> Self {
        self.summary_comment = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Store a `processing` record and start the pipeline in the background.
    ///
    /// The record exists before this returns. Pipeline failures never surface
    /// here; they end up in the record.
    pub async fn submit(&self, request: GenerationRequest) -> Result<Uuid, StoreError> {
        let record = TaskRecord::processing(&request.business_key);
        let task_id = record.id;
        self.store.put(record).await?;

        tracing::info!(
            "Accepted task {} for {} (input_chars={}, model={})",
            task_id,
            request.business_key,
            request.input.chars().count(),
            request.model.as_deref().unwrap_or("(default)")
        );

        let this = self.clone();
        tokio::spawn(async move {
            this.run(task_id, request).await;
        });

        Ok(task_id)
    }

    /// Latest view for a business key; unknown keys yield `not_found`.
    pub async fn query_status(&self, business_key: &str) -> TaskView {
        match self.store.get_by_business_key(business_key).await {
            Some(record) => TaskView::from_record(record),
            None => TaskView::not_found(business_key),
        }
    }

    /// Ask the model to review a single requirement.
    pub async fn validate_requirements(&self, text: &str) -> Result<String, LlmError> {
        self.llm
            .complete(
                &prompt::requirements_review_prompt(text),
                prompt::REQUIREMENTS_SYSTEM_INSTRUCTION,
                None,
            )
            .await
    }

    /// Probe both external services concurrently.
    pub async fn health(&self) -> HealthReport {
        let (tracker, model) = tokio::join!(
            self.tracker.check_reachable(),
            self.llm.check_reachable()
        );
        HealthReport { tracker, model }
    }

    /// Drive one task to its terminal state.
    ///
    /// The pipeline runs in its own tokio task so a panic inside it is still
    /// recorded as a failure instead of leaving the record `processing`.
    async fn run(&self, task_id: Uuid, request: GenerationRequest) {
        let key = request.business_key.clone();
        let worker = self.clone();
        let joined = tokio::spawn(async move { worker.generate(&request).await }).await;

        let outcome = match joined {
            Ok(Ok((output, issue_keys))) => {
                tracing::info!(
                    "Task {} for {} completed, created issues: {:?}",
                    task_id,
                    key,
                    issue_keys
                );
                TaskOutcome::Completed { output, issue_keys }
            }
            Ok(Err(e)) => {
                tracing::error!("Task {} for {} failed: {}", task_id, key, e);
                TaskOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(join_err) => {
                let e = PipelineError::Aborted(join_err.to_string());
                tracing::error!("Task {} for {} failed: {}", task_id, key, e);
                TaskOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if let Err(e) = self.store.finish(task_id, outcome).await {
            tracing::warn!("Dropped terminal write for task {}: {}", task_id, e);
        }
    }

    /// Prompt, complete, parse, create. Returns the raw model output and created keys.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<(String, Vec<String>), PipelineError> {
        let epic = request.business_key.as_str();
        let project = project_key(epic);
        tracing::info!(
            "Processing {} with input: {}...",
            epic,
            preview(&request.input, 100)
        );

        let prompt = prompt::epic_breakdown_prompt(&request.input);
        tracing::info!("Built prompt for {} ({} chars)", epic, prompt.chars().count());

        let output = self
            .llm
            .complete(
                &prompt,
                prompt::EPIC_SYSTEM_INSTRUCTION,
                request.model.as_deref(),
            )
            .await?;
        tracing::info!("Model output for {}: {}", epic, preview(&output, 100));

        let items = parse_work_items(&output)?;
        tracing::info!(
            "Creating {} issues in {} under {}",
            items.len(),
            project,
            epic
        );

        let issue_keys = self.tracker.create_bulk(project, &items, Some(epic)).await?;

        if self.summary_comment && !issue_keys.is_empty() {
            let body = format!(
                "Generated {} issues from this epic: {}",
                issue_keys.len(),
                issue_keys.join(", ")
            );
            if let Err(e) = self.tracker.add_comment(epic, &body).await {
                tracing::warn!("Could not post summary comment on {}: {}", epic, e);
            }
        }

        Ok((output, issue_keys))
    }
}
