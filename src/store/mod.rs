//! Task storage.
//!
//! Records live only in memory and are lost on restart. The orchestrator is
//! the only writer; status queries only read.
//!
//! # Invariants
//! - A record is inserted once, in `processing`.
//! - It receives exactly one terminal write (`completed` or `failed`) and
//!   never changes afterwards.
//! - `created_issue_keys` is non-empty only on `completed` records.

mod memory;

pub use memory::InMemoryTaskStore;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Pipeline still running
    Processing,
    /// Issues created; `result` holds the raw model output
    Completed,
    /// Pipeline failed; `result` describes what went wrong
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Stored state for one generation task.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: Uuid,
    /// Caller-supplied key (the epic), not unique across tasks
    pub business_key: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    /// Tracker keys in creation order
    pub created_issue_keys: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    /// A fresh `processing` record with a new id.
    pub fn processing(business_key: impl Into<String>) -> Self {
        let now = now_string();
        Self {
            id: Uuid::new_v4(),
            business_key: business_key.into(),
            status: TaskStatus::Processing,
            result: None,
            created_issue_keys: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// The single terminal write for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed {
        output: String,
        issue_keys: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Task {0} already exists")]
    DuplicateTask(Uuid),

    #[error("Task {0} not found")]
    UnknownTask(Uuid),

    #[error("Task {0} already reached a terminal status")]
    AlreadyTerminal(Uuid),
}

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Task store trait.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new record. Ids are never reused.
    async fn put(&self, record: TaskRecord) -> Result<(), StoreError>;

    /// Get a record by task id.
    async fn get_by_id(&self, id: Uuid) -> Option<TaskRecord>;

    /// Get the most recently created record for a business key.
    async fn get_by_business_key(&self, business_key: &str) -> Option<TaskRecord>;

    /// Apply the terminal write for a `processing` record.
    async fn finish(&self, id: Uuid, outcome: TaskOutcome) -> Result<TaskRecord, StoreError>;

    /// Number of records still `processing`.
    async fn count_processing(&self) -> usize;
}
