//! Jira REST v2 client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::error::TrackerError;
use super::{IssueDraft, TrackerClient};
use crate::config::{TrackerAuth, TrackerConfig};
use crate::util::preview;

/// Jira REST client authenticated with a bearer token or Basic credentials.
pub struct JiraClient {
    client: Client,
    base_url: String,
    auth: TrackerAuth,
    health_timeout: Duration,
}

impl JiraClient {
    /// Create a client from tracker settings.
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TrackerError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth: config.auth.clone(),
            health_timeout: config.health_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.auth {
            TrackerAuth::Bearer(token) => request.bearer_auth(token),
            TrackerAuth::Basic { email, token } => request.basic_auth(email, Some(token)),
        }
    }

    /// Send a request and return the body of a 2xx answer.
    async fn send(&self, request: RequestBuilder) -> Result<String, TrackerError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(TrackerError::from_transport)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(TrackerError::from_transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(TrackerError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn post_issue(&self, fields: Map<String, Value>) -> Result<String, TrackerError> {
        let body = self
            .send(
                self.client
                    .post(self.url("issue"))
                    .json(&json!({ "fields": fields })),
            )
            .await?;
        let created: CreatedIssue = serde_json::from_str(&body).map_err(|e| {
            TrackerError::InvalidResponse(format!(
                "failed to parse created issue: {}, body: {}",
                e,
                preview(&body, 500)
            ))
        })?;
        created
            .key
            .or(created.id)
            .ok_or_else(|| TrackerError::InvalidResponse("created issue has no key".to_string()))
    }

    async fn update_fields(&self, key: &str, fields: Value) -> Result<(), TrackerError> {
        self.send(
            self.client
                .put(self.url(&format!("issue/{}", key)))
                .json(&json!({ "fields": fields })),
        )
        .await
        .map(|_| ())
    }
}

/// Build the `fields` object for issue creation.
fn create_fields(draft: &IssueDraft<'_>, include_description: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("project".to_string(), json!({ "key": draft.project }));
    fields.insert("summary".to_string(), json!(draft.summary));
    if include_description {
        fields.insert("description".to_string(), json!(draft.description));
    }
    fields.insert(
        "issuetype".to_string(),
        json!({ "name": draft.issue_type.as_str() }),
    );
    if let Some(parent) = draft.parent_key {
        fields.insert("parent".to_string(), json!({ "key": parent }));
    }
    fields
}

/// Whether a Jira 400 body blames `field`, e.g. because it is not on the create screen.
fn rejects_field(body: &str, field: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|v| v.get("errors").and_then(|e| e.get(field)).is_some())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl TrackerClient for JiraClient {
    async fn create_issue(&self, draft: IssueDraft<'_>) -> Result<String, TrackerError> {
        match self.post_issue(create_fields(&draft, true)).await {
            Ok(key) => Ok(key),
            Err(TrackerError::Rejected { status, body })
                if status == 400 && rejects_field(&body, "description") =>
            {
                tracing::warn!(
                    "Tracker refused description on create for {:?}; creating without it",
                    draft.summary
                );
                let key = self.post_issue(create_fields(&draft, false)).await?;
                if !draft.description.is_empty() {
                    if let Err(e) = self
                        .update_fields(&key, json!({ "description": draft.description }))
                        .await
                    {
                        return Err(TrackerError::UpdateAfterCreateFailed {
                            key,
                            source: Box::new(e),
                        });
                    }
                }
                Ok(key)
            }
            Err(e) => Err(e),
        }
    }

    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<(), TrackerError> {
        self.send(
            self.client
                .post(self.url(&format!("issue/{}/comment", issue_key)))
                .json(&json!({ "body": body })),
        )
        .await
        .map(|_| ())
    }

    async fn check_reachable(&self) -> bool {
        let request = self
            .client
            .get(self.url("myself"))
            .timeout(self.health_timeout);
        match self.authorized(request).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!("Tracker probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::{IssueType, WorkItem};
    use crate::test_support::{spawn_server, unused_base_url};
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    /// Requests seen by the fake tracker, as (method+path, body).
    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    fn client_for(base_url: &str) -> JiraClient {
        let config = Config::new(base_url, "http://unused");
        JiraClient::new(&config.tracker).unwrap()
    }

    fn item(summary: &str) -> WorkItem {
        WorkItem {
            summary: summary.to_string(),
            description: format!("{} details", summary),
            issue_type: IssueType::Story,
        }
    }

    /// Fake tracker that numbers issues from PROJ-1 and fails summaries containing "boom".
    fn numbering_tracker(seen: Seen) -> Router {
        Router::new()
            .route(
                "/rest/api/2/issue",
                post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                    let mut seen = seen.lock().unwrap();
                    let summary = body["fields"]["summary"].as_str().unwrap_or("").to_string();
                    seen.push(("POST issue".to_string(), body));
                    if summary.contains("boom") {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"errors": {"summary": "boom"}})),
                        );
                    }
                    let n = seen.len();
                    (
                        StatusCode::CREATED,
                        Json(json!({"id": format!("{}", 1000 + n), "key": format!("PROJ-{}", n)})),
                    )
                }),
            )
            .with_state(seen)
    }

    #[tokio::test]
    async fn test_create_issue_sends_fields_and_parent() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(numbering_tracker(Arc::clone(&seen))).await;

        let key = client_for(&base)
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "Login form",
                description: "As a user",
                issue_type: &IssueType::Story,
                parent_key: Some("PROJ-100"),
            })
            .await
            .unwrap();
        assert_eq!(key, "PROJ-1");

        let seen = seen.lock().unwrap();
        let fields = &seen[0].1["fields"];
        assert_eq!(fields["project"]["key"], "PROJ");
        assert_eq!(fields["summary"], "Login form");
        assert_eq!(fields["description"], "As a user");
        assert_eq!(fields["issuetype"]["name"], "Story");
        assert_eq!(fields["parent"]["key"], "PROJ-100");
    }

    #[tokio::test]
    async fn test_create_issue_without_parent_omits_field() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(numbering_tracker(Arc::clone(&seen))).await;

        client_for(&base)
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "",
                description: "",
                issue_type: &IssueType::Task,
                parent_key: None,
            })
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen[0].1["fields"].get("parent").is_none());
        assert_eq!(seen[0].1["fields"]["summary"], "");
    }

    /// Authorization header the tracker sees on a probe made with `auth`.
    async fn authorization_seen(auth: TrackerAuth) -> Option<String> {
        let headers: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/rest/api/2/myself",
                get(
                    |State(h): State<Arc<Mutex<Option<String>>>>, headers: HeaderMap| async move {
                        *h.lock().unwrap() = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());
                        Json(json!({"name": "admin"}))
                    },
                ),
            )
            .with_state(Arc::clone(&headers));
        let base = spawn_server(app).await;

        let mut config = Config::new(&base, "http://unused");
        config.tracker.auth = auth;
        let client = JiraClient::new(&config.tracker).unwrap();

        assert!(client.check_reachable().await);
        let seen = headers.lock().unwrap().clone();
        seen
    }

    #[tokio::test]
    async fn test_bearer_auth_header() {
        let header = authorization_seen(TrackerAuth::Bearer("secret-token".to_string())).await;
        assert_eq!(header.as_deref(), Some("Bearer secret-token"));
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let header = authorization_seen(TrackerAuth::Basic {
            email: "pm@example.com".to_string(),
            token: "api-token".to_string(),
        })
        .await;
        // base64("pm@example.com:api-token")
        assert_eq!(
            header.as_deref(),
            Some("Basic cG1AZXhhbXBsZS5jb206YXBpLXRva2Vu")
        );
    }

    #[tokio::test]
    async fn test_description_moved_to_follow_up_put() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/rest/api/2/issue",
                post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                    let has_description = body["fields"].get("description").is_some();
                    seen.lock().unwrap().push(("POST issue".to_string(), body));
                    if has_description {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"errors": {"description": "Field 'description' cannot be set."}})),
                        )
                    } else {
                        (StatusCode::CREATED, Json(json!({"key": "PROJ-7"})))
                    }
                }),
            )
            .route(
                "/rest/api/2/issue/:key",
                put(
                    |State(seen): State<Seen>, Path(key): Path<String>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((format!("PUT {}", key), body));
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let base = spawn_server(app).await;

        let key = client_for(&base)
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "s",
                description: "long text",
                issue_type: &IssueType::Task,
                parent_key: None,
            })
            .await
            .unwrap();
        assert_eq!(key, "PROJ-7");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].1["fields"].get("description").is_none());
        assert_eq!(seen[2].0, "PUT PROJ-7");
        assert_eq!(seen[2].1["fields"]["description"], "long text");
    }

    /// Refuses `description` on create, creates PROJ-77 without it, then forbids the update.
    fn description_update_forbidden(seen: Seen) -> Router {
        Router::new()
            .route(
                "/rest/api/2/issue",
                post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                    let has_description = body["fields"].get("description").is_some();
                    seen.lock().unwrap().push(("POST issue".to_string(), body));
                    if has_description {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"errors": {"description": "Field 'description' cannot be set."}})),
                        )
                    } else {
                        (StatusCode::CREATED, Json(json!({"key": "PROJ-77"})))
                    }
                }),
            )
            .route(
                "/rest/api/2/issue/:key",
                put(
                    |State(seen): State<Seen>, Path(key): Path<String>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((format!("PUT {}", key), body));
                        StatusCode::FORBIDDEN
                    },
                ),
            )
            .with_state(seen)
    }

    #[tokio::test]
    async fn test_failed_follow_up_put_keeps_created_key() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(description_update_forbidden(Arc::clone(&seen))).await;

        let err = client_for(&base)
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "s",
                description: "long text",
                issue_type: &IssueType::Task,
                parent_key: None,
            })
            .await
            .unwrap_err();
        match &err {
            TrackerError::UpdateAfterCreateFailed { key, source } => {
                assert_eq!(key, "PROJ-77");
                assert!(matches!(**source, TrackerError::Rejected { status: 403, .. }));
            }
            other => panic!("expected UpdateAfterCreateFailed, got {:?}", other),
        }
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_bulk_reports_half_created_issue() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(description_update_forbidden(Arc::clone(&seen))).await;

        let err = client_for(&base)
            .create_bulk("PROJ", &[item("s"), item("t")], Some("PROJ-1"))
            .await
            .unwrap_err();
        match err {
            TrackerError::ItemFailed {
                index, created, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(created, vec!["PROJ-77"]);
            }
            other => panic!("expected ItemFailed, got {:?}", other),
        }
        // the second item is never attempted
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_rejections_are_not_retried() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(numbering_tracker(Arc::clone(&seen))).await;

        let err = client_for(&base)
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "boom",
                description: "d",
                issue_type: &IssueType::Task,
                parent_key: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Rejected { status: 400, .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_bulk_preserves_order() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(numbering_tracker(Arc::clone(&seen))).await;

        let keys = client_for(&base)
            .create_bulk("PROJ", &[item("a"), item("b"), item("c")], Some("PROJ-100"))
            .await
            .unwrap();
        assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);

        let seen = seen.lock().unwrap();
        let summaries: Vec<&str> = seen
            .iter()
            .map(|(_, body)| body["fields"]["summary"].as_str().unwrap())
            .collect();
        assert_eq!(summaries, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_create_bulk_aborts_on_first_failure() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(numbering_tracker(Arc::clone(&seen))).await;

        let err = client_for(&base)
            .create_bulk("PROJ", &[item("a"), item("boom"), item("c")], None)
            .await
            .unwrap_err();
        match err {
            TrackerError::ItemFailed {
                index,
                total,
                summary,
                created,
                ..
            } => {
                assert_eq!(index, 2);
                assert_eq!(total, 3);
                assert_eq!(summary, "boom");
                assert_eq!(created, vec!["PROJ-1"]);
            }
            other => panic!("expected ItemFailed, got {:?}", other),
        }
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_comment_posts_plain_body() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/rest/api/2/issue/:key/comment",
                post(
                    |State(seen): State<Seen>, Path(key): Path<String>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((key, body));
                        (StatusCode::CREATED, Json(json!({"id": "1"})))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let base = spawn_server(app).await;

        client_for(&base)
            .add_comment("PROJ-100", "Created PROJ-1")
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "PROJ-100");
        assert_eq!(seen[0].1, json!({"body": "Created PROJ-1"}));
    }

    #[tokio::test]
    async fn test_unreachable_tracker() {
        let base = unused_base_url().await;
        let client = client_for(&base);
        assert!(!client.check_reachable().await);

        let err = client
            .create_issue(IssueDraft {
                project: "PROJ",
                summary: "s",
                description: "d",
                issue_type: &IssueType::Task,
                parent_key: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Unreachable(_)));
    }

    #[test]
    fn test_rejects_field() {
        assert!(rejects_field(
            r#"{"errorMessages":[],"errors":{"description":"not on screen"}}"#,
            "description"
        ));
        assert!(!rejects_field(r#"{"errors":{"summary":"required"}}"#, "description"));
        assert!(!rejects_field("<html>", "description"));
    }
}
