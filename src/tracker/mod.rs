//! Issue tracker client module.
//!
//! The orchestrator only sees the [`TrackerClient`] trait; [`JiraClient`]
//! talks to the Jira REST v2 API.
//!
//! Bulk creation is a loop of single creates. There is no atomic bulk
//! endpoint and no rollback: the first failing item stops the loop and the
//! issues created before it stay in the tracker, as does an issue whose
//! follow-up update failed.

mod error;
mod jira;

pub use error::TrackerError;
pub use jira::JiraClient;

use async_trait::async_trait;

use crate::parser::{IssueType, WorkItem};

/// Fields for a single issue creation.
#[derive(Debug, Clone, Copy)]
pub struct IssueDraft<'a> {
    /// Project key, e.g. `PROJ`
    pub project: &'a str,
    pub summary: &'a str,
    pub description: &'a str,
    pub issue_type: &'a IssueType,
    /// Epic or parent issue key
    pub parent_key: Option<&'a str>,
}

/// Trait for issue tracker clients.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Create one issue and return its key.
    async fn create_issue(&self, draft: IssueDraft<'_>) -> Result<String, TrackerError>;

    /// Add a plain-text comment to an existing issue.
    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<(), TrackerError>;

    /// Probe the tracker. Bounded by a short timeout and never errors.
    async fn check_reachable(&self) -> bool;

    /// Create `items` one by one, in order, under `parent_key`.
    ///
    /// Stops at the first failure and returns [`TrackerError::ItemFailed`].
    /// An issue the failing item left behind in the tracker is listed in
    /// `created` after the ones that succeeded.
    async fn create_bulk(
        &self,
        project: &str,
        items: &[WorkItem],
        parent_key: Option<&str>,
    ) -> Result<Vec<String>, TrackerError> {
        let total = items.len();
        let mut created = Vec::with_capacity(total);

        for (i, item) in items.iter().enumerate() {
            let draft = IssueDraft {
                project,
                summary: &item.summary,
                description: &item.description,
                issue_type: &item.issue_type,
                parent_key,
            };
            match self.create_issue(draft).await {
                Ok(key) => {
                    tracing::debug!("Created {} ({}/{})", key, i + 1, total);
                    created.push(key);
                }
                Err(source) => {
                    if let Some(key) = source.committed_key() {
                        created.push(key.to_string());
                    }
                    tracing::error!(
                        "Bulk create stopped at item {}/{} ({} already created): {}",
                        i + 1,
                        total,
                        created.len(),
                        source
                    );
                    return Err(TrackerError::ItemFailed {
                        index: i + 1,
                        total,
                        summary: item.summary.clone(),
                        created,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(created)
    }
}
