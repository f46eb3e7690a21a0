//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for SQLite databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseBackend, DatabaseClient, QueryResult, Row, Value};
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement as _, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database file.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Creates a new SqliteClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool for the configured SQLite database.
    ///
    /// The database file must already exist unless the URL asks otherwise
    /// (`?mode=rwc`).
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| GuardError::config(format!("Invalid SQLite connection string: {e}")))?
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                GuardError::connection(format!(
                    "Cannot open SQLite database {}: {}",
                    config.display_string(),
                    database_message(&e)
                ))
            })?;

        debug!("Connected to {}", config.display_string());
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn execute_statement(&self, sql: &str) -> Result<QueryResult> {
        // Dropping the transaction on any early return rolls back and hands
        // the connection back to the pool.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GuardError::connection(database_message(&e)))?;

        // SQLite resolves tables and columns at prepare time, so metadata is
        // read before execution and stays canonical for empty results.
        let statement = (&mut *tx)
            .prepare(sql)
            .await
            .map_err(|e| GuardError::query(database_message(&e)))?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let fetched: Vec<SqliteRow> = sqlx::query(sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| GuardError::query(database_message(&e)))?;

        tx.commit()
            .await
            .map_err(|e| GuardError::query(database_message(&e)))?;

        let rows: Vec<Row> = fetched.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single value using its runtime storage class.
///
/// SQLite columns are loosely typed, so the declared column type is only a
/// hint; the stored value decides how it decodes.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "INT8" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // TEXT, NUMERIC, DATE, DATETIME and anything else
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .or_else(|_| row.try_get::<i64, _>(index).map(Value::Int))
            .or_else(|_| row.try_get::<f64, _>(index).map(Value::Float))
            .unwrap_or(Value::Null),
    }
}

/// Extracts the database's own diagnostic when there is one.
fn database_message(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
