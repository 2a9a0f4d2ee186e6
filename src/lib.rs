//! # epic_relay
//!
//! Turns a free-form epic description into linked tracker issues using a
//! local language model.
//!
//! ## Architecture
//!
//! ```text
//!   HTTP API ──► Orchestrator ──► TaskStore (in memory)
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!      LlmClient         TrackerClient
//!    (LM Studio)            (Jira)
//! ```
//!
//! ## Task Flow
//! 1. Receive an epic via the API, store a `processing` task, answer with its id
//! 2. Ask the model for a JSON array of work items
//! 3. Parse the answer, rejecting anything that is not a bare array of objects
//! 4. Create the issues one by one under the epic
//! 5. Record `completed` or `failed`; clients poll status by epic key
//!
//! ## Modules
//! - `api`: axum routes and wire types
//! - `orchestrator`: task lifecycle and pipeline
//! - `parser`: model output decoding
//! - `store`: task records
//! - `llm`: model endpoint client
//! - `tracker`: issue tracker client

pub mod api;
pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod store;
pub mod tracker;
pub mod util;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use orchestrator::Orchestrator;
