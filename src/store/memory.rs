//! In-memory task store (non-persistent).

use super::{now_string, StoreError, TaskOutcome, TaskRecord, TaskStatus, TaskStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct Entry {
    /// Insertion order; higher is newer
    seq: u64,
    record: TaskRecord,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    tasks: HashMap<Uuid, Entry>,
}

/// Process-local task store. Records are never evicted, so memory grows
/// with every submitted task until restart.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, record: TaskRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.tasks.contains_key(&record.id) {
            return Err(StoreError::DuplicateTask(record.id));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(record.id, Entry { seq, record });
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Option<TaskRecord> {
        self.inner
            .read()
            .await
            .tasks
            .get(&id)
            .map(|e| e.record.clone())
    }

    async fn get_by_business_key(&self, business_key: &str) -> Option<TaskRecord> {
        self.inner
            .read()
            .await
            .tasks
            .values()
            .filter(|e| e.record.business_key == business_key)
            .max_by_key(|e| e.seq)
            .map(|e| e.record.clone())
    }

    async fn finish(&self, id: Uuid, outcome: TaskOutcome) -> Result<TaskRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = &mut inner
            .tasks
            .get_mut(&id)
            .ok_or(StoreError::UnknownTask(id))?
            .record;
        if record.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(id));
        }
        match outcome {
            TaskOutcome::Completed { output, issue_keys } => {
                record.status = TaskStatus::Completed;
                record.result = Some(output);
                record.created_issue_keys = issue_keys;
            }
            TaskOutcome::Failed { reason } => {
                record.status = TaskStatus::Failed;
                record.result = Some(reason);
                record.created_issue_keys = Vec::new();
            }
        }
        record.updated_at = now_string();
        Ok(record.clone())
    }

    async fn count_processing(&self) -> usize {
        self.inner
            .read()
            .await
            .tasks
            .values()
            .filter(|e| e.record.status == TaskStatus::Processing)
            .count()
    }
}
