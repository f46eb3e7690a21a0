//! Bounded statement execution.
//!
//! Runs one normalized statement on the injected pool and folds every result,
//! fault and timeout into an [`ExecutionOutcome`]. Nothing here returns an
//! error to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::db::{DatabaseClient, Row};

/// Default per-statement timeout.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of running a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The statement produced a result set, possibly with zero rows.
    Rows {
        /// Column names in result order.
        columns: Vec<String>,
        /// Fetched rows, each aligned with `columns`.
        rows: Vec<Row>,
    },
    /// The statement completed without any result set.
    Empty,
    /// The database reported a fault, or the statement timed out.
    Fault(String),
}

/// Executes validated statements against a shared database client.
#[derive(Clone)]
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Creates an executor with the default statement timeout.
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self {
            db,
            timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Sets the per-statement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the per-statement timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the underlying database client.
    pub fn client(&self) -> &Arc<dyn DatabaseClient> {
        &self.db
    }

    /// Runs `sql` verbatim and classifies the result.
    ///
    /// The caller must have validated `sql`; no checks happen here.
    pub async fn execute(&self, sql: &str) -> ExecutionOutcome {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.db.execute_statement(sql)).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(query_result)) if !query_result.has_result_set() => {
                debug!(?elapsed, "Statement completed without a result set");
                ExecutionOutcome::Empty
            }
            Ok(Ok(query_result)) => {
                debug!(?elapsed, rows = query_result.row_count, "Statement completed");
                ExecutionOutcome::Rows {
                    columns: query_result.columns,
                    rows: query_result.rows,
                }
            }
            Ok(Err(e)) => {
                warn!(?elapsed, error = %e, "Statement failed");
                ExecutionOutcome::Fault(e.diagnostic().to_string())
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Statement timed out");
                ExecutionOutcome::Fault(format!(
                    "query timed out after {} seconds",
                    self.timeout.as_secs_f64()
                ))
            }
        }
    }
}
