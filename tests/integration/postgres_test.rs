//! Guard calls against PostgreSQL.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL to a postgres:// URL to run them.

use std::sync::Arc;

use db_guard::config::{Config, ConnectionConfig};
use db_guard::db::{DatabaseBackend, DatabaseClient, PostgresClient, Value};
use db_guard::guard::SqlGuard;
use db_guard::tool::ToolResult;

/// Helper to create a guard over the test database.
async fn get_test_guard() -> Option<SqlGuard> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let connection = ConnectionConfig::from_connection_string(&url).ok()?;
    if connection.backend != DatabaseBackend::Postgres {
        return None;
    }
    let client: Arc<dyn DatabaseClient> = Arc::new(PostgresClient::connect(&connection).await.ok()?);
    SqlGuard::from_config(&Config::default(), client).ok()
}

#[tokio::test]
async fn test_select_literal() {
    let Some(guard) = get_test_guard().await else {
        eprintln!("Skipping test: DATABASE_URL not set to postgres");
        return;
    };

    let result = guard.execute_sql("SELECT 1 AS num, 'hello' AS greeting").await;
    assert_eq!(
        result,
        ToolResult::Rows {
            columns: vec!["num".to_string(), "greeting".to_string()],
            rows: vec![vec![Value::Int(1), Value::from("hello")]],
        }
    );

    guard.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(guard) = get_test_guard().await else {
        eprintln!("Skipping test: DATABASE_URL not set to postgres");
        return;
    };

    let result = guard
        .execute_sql("SELECT n FROM generate_series(1, 3) AS n WHERE n > 10")
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({"columns": ["n"], "rows": []})
    );

    guard.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_table_is_a_fault() {
    let Some(guard) = get_test_guard().await else {
        eprintln!("Skipping test: DATABASE_URL not set to postgres");
        return;
    };

    let result = guard.execute_sql("SELECT * FROM nonexistent_table").await;
    let text = result.as_text().unwrap();
    assert!(text.starts_with("ERROR: "), "{}", text);
    assert!(text.contains("nonexistent_table"), "{}", text);

    guard.close().await.unwrap();
}

#[tokio::test]
async fn test_write_is_rejected() {
    let Some(guard) = get_test_guard().await else {
        eprintln!("Skipping test: DATABASE_URL not set to postgres");
        return;
    };

    let result = guard.execute_sql("CREATE TABLE guard_scratch (id int)").await;
    assert_eq!(
        result.as_text(),
        Some("ERROR: write operations are not allowed.")
    );

    guard.close().await.unwrap();
}

#[tokio::test]
async fn test_aggregates_keep_their_values() {
    let Some(guard) = get_test_guard().await else {
        eprintln!("Skipping test: DATABASE_URL not set to postgres");
        return;
    };

    let result = guard
        .execute_sql("SELECT SUM(x) FROM (VALUES (1),(2)) t(x)")
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap()["rows"],
        serde_json::json!([[3]])
    );

    let result = guard
        .execute_sql("SELECT SUM(x::numeric) AS total, AVG(x) AS mean FROM (VALUES (1),(2)) t(x)")
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({"columns": ["total", "mean"], "rows": [[3, 1.5]]})
    );

    guard.close().await.unwrap();
}
