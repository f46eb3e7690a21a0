//! Database abstraction layer for db-guard.
//!
//! Provides a trait-based interface for running already-validated statements,
//! allowing different database backends to be used interchangeably.

mod mock;
mod postgres;
mod sqlite;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl DatabaseBackend {
    /// Parses a backend from a URL scheme or name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Opens a connection pool for the configured backend.
///
/// The returned client is shared by reference for the lifetime of the host
/// process and must be closed explicitly at shutdown.
pub async fn connect(config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(config).await?;
            Ok(Arc::new(client))
        }
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config).await?;
            Ok(Arc::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// Implementations perform no policy checks of their own; callers must only
/// pass statements a [`crate::safety::Checker`] has accepted.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Executes one statement on a pooled connection inside a transaction,
    /// commits, and returns the fetched result set.
    ///
    /// Statements that produce no result set return a `QueryResult` without
    /// columns. Database faults are returned as `GuardError::Query` carrying
    /// the backend diagnostic.
    async fn execute_statement(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection pool.
    async fn close(&self) -> Result<()>;
}
