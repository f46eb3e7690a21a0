//! Tool contract exposed to agent frameworks.
//!
//! An agent calls the tool with a single `sql` field and always gets back a
//! [`ToolResult`]: either a structured result set or a plain string.

use serde::{Deserialize, Serialize};

use crate::config::ToolConfig;
use crate::db::Row;
use crate::query::ExecutionOutcome;
use crate::safety::PolicyViolation;

/// Returned for statements that complete without a result set.
pub const NO_RESULT_SET: &str = "OK (no result set)";

/// Prefix for every rejection and fault.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSqlInput {
    pub sql: String,
}

/// What the agent sees after a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    /// `{"columns": [...], "rows": [[...], ...]}`
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// `"OK (no result set)"` or `"ERROR: <reason>"`.
    Text(String),
}

impl ToolResult {
    /// Builds an `ERROR: <reason>` result.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Self::Text(format!("{ERROR_PREFIX}{reason}"))
    }

    /// Returns true if this is a rejection or fault.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with(ERROR_PREFIX))
    }

    /// Returns the text for string-shaped results.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Rows { .. } => None,
        }
    }

    /// Serializes the result for the tool channel.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::Value::String(format!("{ERROR_PREFIX}{e}")).to_string()
        })
    }
}

impl From<PolicyViolation> for ToolResult {
    fn from(violation: PolicyViolation) -> Self {
        Self::error(violation)
    }
}

impl From<ExecutionOutcome> for ToolResult {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Rows { columns, rows } => Self::Rows { columns, rows },
            ExecutionOutcome::Empty => Self::Text(NO_RESULT_SET.to_string()),
            ExecutionOutcome::Fault(message) => Self::error(message),
        }
    }
}

/// Returns the tool definition advertised to the agent.
pub fn tool_definition(config: &ToolConfig) -> ToolDefinition {
    ToolDefinition {
        name: config.name.clone(),
        description: config.description.clone(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single read-only SELECT statement, bounded with LIMIT when returning many rows."
                }
            },
            "required": ["sql"]
        }),
    }
}
