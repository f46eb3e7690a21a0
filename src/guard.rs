//! The guarded `execute_sql` tool.
//!
//! `SqlGuard` validates every statement before it reaches the executor and
//! turns each outcome into a [`ToolResult`]. Rejected statements never touch
//! the database.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Config, ToolConfig};
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::query::QueryExecutor;
use crate::safety::{build_checker, Checker, ValidationOutcome};
use crate::tool::{tool_definition, ExecuteSqlInput, ToolDefinition, ToolResult};

/// Validator, executor and tool metadata bundled into one callable tool.
pub struct SqlGuard {
    checker: Box<dyn Checker>,
    executor: QueryExecutor,
    tool: ToolConfig,
}

impl SqlGuard {
    /// Creates a guard from its parts.
    pub fn new(checker: Box<dyn Checker>, executor: QueryExecutor, tool: ToolConfig) -> Self {
        Self {
            checker,
            executor,
            tool,
        }
    }

    /// Builds a guard over `db` using the `[guard]` and `[tool]` settings.
    pub fn from_config(config: &Config, db: Arc<dyn DatabaseClient>) -> Result<Self> {
        let checker = build_checker(config.guard.checker, config.guard.policy(), db.backend())?;
        let executor = QueryExecutor::new(db).with_timeout(config.guard.statement_timeout());
        Ok(Self::new(checker, executor, config.tool.clone()))
    }

    /// Validates without executing.
    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        self.checker.check(sql)
    }

    /// Validates `sql` and, if accepted, runs the normalized text.
    pub async fn execute_sql(&self, sql: &str) -> ToolResult {
        let normalized = match self.checker.check(sql) {
            ValidationOutcome::Accepted(normalized) => normalized,
            ValidationOutcome::Rejected(violation) => {
                info!(checker = self.checker.name(), %violation, "Statement rejected");
                return violation.into();
            }
        };

        debug!(sql = %normalized, "Executing statement");
        self.executor.execute(&normalized).await.into()
    }

    /// Handles a raw tool call whose arguments arrive as JSON.
    pub async fn call(&self, arguments: &serde_json::Value) -> ToolResult {
        match serde_json::from_value::<ExecuteSqlInput>(arguments.clone()) {
            Ok(input) => self.execute_sql(&input.sql).await,
            Err(e) => ToolResult::error(format!("invalid tool input: {e}")),
        }
    }

    /// Returns the tool definition to register with the agent.
    pub fn definition(&self) -> ToolDefinition {
        tool_definition(&self.tool)
    }

    /// Returns the name of the active checker.
    pub fn checker_name(&self) -> &'static str {
        self.checker.name()
    }

    /// Closes the underlying connection pool.
    pub async fn close(&self) -> Result<()> {
        self.executor.client().close().await
    }
}
