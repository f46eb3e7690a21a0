//! Mock database client for testing.
//!
//! Returns a canned result (or fault) for every statement and records what it
//! was asked to run, so tests can assert that rejected SQL never arrives.

use super::{DatabaseBackend, DatabaseClient, QueryResult, Row, Value};
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Debug)]
pub struct MockDatabaseClient {
    result: QueryResult,
    fault: Option<String>,
    delay: Option<Duration>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a mock that answers every statement with one `result` row.
    pub fn new() -> Self {
        Self {
            result: QueryResult::with_data(
                vec!["result".to_string()],
                vec![vec![Value::from("mock")]],
            ),
            fault: None,
            delay: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Answers every statement with the given columns and rows.
    pub fn with_rows(mut self, columns: &[&str], rows: Vec<Row>) -> Self {
        let columns = columns
            .iter()
            .map(|name| name.to_string())
            .collect();
        self.result = QueryResult::with_data(columns, rows);
        self
    }

    /// Answers every statement with an arbitrary result.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = result;
        self
    }

    /// Fails every statement with a database fault carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(message.into());
        self
    }

    /// Sleeps before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every statement received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn execute_statement(&self, sql: &str) -> Result<QueryResult> {
        self.log().push(sql.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.fault {
            Some(message) => Err(GuardError::query(message.clone())),
            None => Ok(self.result.clone()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
