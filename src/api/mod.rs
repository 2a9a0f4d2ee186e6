//! HTTP API for epic_relay.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/jira/epic/generate` - Start breaking an epic down into issues
//! - `GET /api/v1/jira/epic/{key}/status` - Status of the latest task for an epic
//! - `POST /api/v1/requirements/validate` - Ask the model to review a requirement
//! - `GET /api/v1/health` - Reachability of Jira and the model endpoint

mod routes;
pub mod types;

pub use routes::{build_state, router, serve, AppState};
pub use types::*;
