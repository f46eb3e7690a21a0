//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseBackend, DatabaseClient, QueryResult, Row, Value};
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement as _, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool, retrying transient failures with backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect(&config.url)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn execute_statement(&self, sql: &str) -> Result<QueryResult> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GuardError::connection(e.to_string()))?;

        let fetched: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| GuardError::query(format_query_error(e)))?;

        // Column metadata comes from the first row when there is one, otherwise
        // from the prepared statement description.
        let columns: Vec<String> = match fetched.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            None => (&mut *tx)
                .prepare(sql)
                .await
                .map_err(|e| GuardError::query(format_query_error(e)))?
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
        };

        tx.commit()
            .await
            .map_err(|e| GuardError::query(format_query_error(e)))?;

        let rows = fetched
            .iter()
            .map(convert_row)
            .collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|col| convert_value(row, col))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Types without a JSON scalar counterpart (dates, UUIDs, JSON documents)
/// become strings. A type that cannot be decoded is a query fault rather
/// than a silent NULL.
fn convert_value(row: &PgRow, column: &PgColumn) -> Result<Value> {
    let value = match column.type_info().name() {
        "BOOL" => decode::<bool>(row, column)?.map(Value::Bool),
        "INT2" => decode::<i16>(row, column)?.map(|v| Value::Int(v.into())),
        "INT4" => decode::<i32>(row, column)?.map(|v| Value::Int(v.into())),
        "INT8" => decode::<i64>(row, column)?.map(Value::Int),
        "FLOAT4" => decode::<f32>(row, column)?.map(|v| Value::Float(v.into())),
        "FLOAT8" => decode::<f64>(row, column)?.map(Value::Float),
        "NUMERIC" => decode::<Decimal>(row, column)?.map(numeric_value),
        "DATE" => decode::<NaiveDate>(row, column)?.map(|v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, column)?.map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => {
            decode::<NaiveDateTime>(row, column)?.map(|v| Value::String(v.to_string()))
        }
        "TIMESTAMPTZ" => {
            decode::<DateTime<Utc>>(row, column)?.map(|v| Value::String(v.to_rfc3339()))
        }
        "UUID" => decode::<Uuid>(row, column)?.map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => {
            decode::<JsonValue>(row, column)?.map(|v| Value::String(v.to_string()))
        }
        "BYTEA" => decode::<Vec<u8>>(row, column)?.map(Value::Bytes),
        // Text types; anything else fails to decode as a string
        _ => decode::<String>(row, column)?.map(Value::from),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn decode<'r, T>(row: &'r PgRow, column: &PgColumn) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(column.ordinal()).map_err(|e| {
        GuardError::query(format!(
            "cannot decode column \"{}\" of type {}: {}",
            column.name(),
            column.type_info().name(),
            e
        ))
    })
}

/// Whole numerics become integers when they fit, the rest floats.
fn numeric_value(decimal: Decimal) -> Value {
    let text = decimal.normalize().to_string();
    if let Ok(int) = text.parse::<i64>() {
        return Value::Int(int);
    }
    match text.parse::<f64>() {
        Ok(float) => Value::Float(float),
        Err(_) => Value::String(text),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> GuardError {
    let target = config.display_string();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GuardError::connection(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GuardError::connection(format!(
            "Authentication failed for {target}. Check your credentials."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GuardError::connection(format!(
            "Connection to {target} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GuardError::connection(error.to_string())
    }
}

/// Formats a statement error with PostgreSQL detail and hint when available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = db_error.message().to_string();

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
