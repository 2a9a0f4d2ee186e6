//! Decoding of model output into work-item descriptors.
//!
//! The model is told to answer with a bare JSON array of objects. Anything
//! else is rejected: there is no attempt to dig JSON out of surrounding prose
//! or to repair truncated output.

use serde_json::{Map, Value};
use thiserror::Error;

/// Issue type requested for a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueType {
    Story,
    Task,
    Bug,
    /// Any other type name; the tracker decides whether it exists.
    Other(String),
}

impl IssueType {
    /// Tracker-facing type name.
    pub fn as_str(&self) -> &str {
        match self {
            IssueType::Story => "Story",
            IssueType::Task => "Task",
            IssueType::Bug => "Bug",
            IssueType::Other(name) => name,
        }
    }

    /// Map a type name to a known variant, case-insensitively.
    ///
    /// Blank names fall back to `Task`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "task" => IssueType::Task,
            "story" => IssueType::Story,
            "bug" => IssueType::Bug,
            _ => IssueType::Other(trimmed.to_string()),
        }
    }
}

impl Default for IssueType {
    fn default() -> Self {
        IssueType::Task
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue to create, as described by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Short title; the prompt asks for at most 100 characters but this is not enforced
    pub summary: String,
    pub description: String,
    pub issue_type: IssueType,
}

/// The model output is not a JSON array of work-item objects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed model response: not valid JSON ({0})")]
    InvalidJson(String),

    #[error("Malformed model response: expected a JSON array, got {0}")]
    NotAnArray(&'static str),

    #[error("Malformed model response: item {index} is {kind}, expected an object")]
    NotAnObject { index: usize, kind: &'static str },

    #[error("Malformed model response: item {index} field '{field}' is {kind}, expected a string")]
    InvalidField {
        index: usize,
        field: &'static str,
        kind: &'static str,
    },
}

/// Parse raw model text into an ordered list of work items.
///
/// Item indices in errors are 1-based.
pub fn parse_work_items(raw: &str) -> Result<Vec<WorkItem>, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        other => return Err(ParseError::NotAnArray(json_kind(&other))),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = i + 1;
            match item {
                Value::Object(fields) => work_item_from_fields(index, fields),
                other => Err(ParseError::NotAnObject {
                    index,
                    kind: json_kind(other),
                }),
            }
        })
        .collect()
}

fn work_item_from_fields(index: usize, fields: &Map<String, Value>) -> Result<WorkItem, ParseError> {
    let summary = string_field(index, fields, "summary")?.unwrap_or_default();
    let description = string_field(index, fields, "description")?.unwrap_or_default();

    let issue_type = match string_field(index, fields, "issue_type")? {
        Some(name) => Some(name),
        None => string_field(index, fields, "issueType")?,
    }
    .map(|name| IssueType::from_name(&name))
    .unwrap_or_default();

    Ok(WorkItem {
        summary,
        description,
        issue_type,
    })
}

/// Read an optional string field. `null` counts as absent.
fn string_field(
    index: usize,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ParseError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ParseError::InvalidField {
            index,
            field,
            kind: json_kind(other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
