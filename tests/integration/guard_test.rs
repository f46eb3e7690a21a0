//! End-to-end tool calls against a seeded SQLite database.

use db_guard::config::Config;
use db_guard::db::Value;
use db_guard::safety::CheckerKind;
use db_guard::tool::ToolResult;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::common::TestDatabase;

async fn customer_count(db: &TestDatabase) -> ToolResult {
    db.guard()
        .await
        .execute_sql("SELECT COUNT(*) AS n FROM customers")
        .await
}

#[tokio::test]
async fn test_delete_is_rejected() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let result = guard.execute_sql("DELETE FROM orders").await;
    assert_eq!(
        result,
        ToolResult::Text("ERROR: write operations are not allowed.".to_string())
    );

    let orders = guard.execute_sql("SELECT COUNT(*) FROM orders").await;
    assert_eq!(
        serde_json::to_value(&orders).unwrap()["rows"],
        json!([[4]])
    );
}

#[tokio::test]
async fn test_chained_drop_reports_write_and_leaves_table() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let result = guard
        .execute_sql("SELECT * FROM customers; DROP TABLE customers;")
        .await;
    assert_eq!(
        result.as_text(),
        Some("ERROR: write operations are not allowed.")
    );

    let chained = guard
        .execute_sql("SELECT * FROM customers; SELECT * FROM orders")
        .await;
    assert_eq!(
        chained.as_text(),
        Some("ERROR: multiple statements are not allowed.")
    );

    assert_eq!(
        serde_json::to_value(customer_count(&db).await).unwrap(),
        json!({"columns": ["n"], "rows": [[3]]})
    );
}

#[tokio::test]
async fn test_select_gets_row_cap_and_returns_rows() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    assert_eq!(
        guard
            .validate("select id, region from customers")
            .normalized_sql(),
        Some("select id, region from customers LIMIT 200")
    );

    let result = guard.execute_sql("select id, region from customers").await;
    assert_eq!(
        result,
        ToolResult::Rows {
            columns: vec!["id".to_string(), "region".to_string()],
            rows: vec![
                vec![Value::Int(1), Value::from("west")],
                vec![Value::Int(2), Value::from("east")],
                vec![Value::Int(3), Value::from("west")],
            ],
        }
    );
    assert_eq!(
        result.to_json(),
        r#"{"columns":["id","region"],"rows":[[1,"west"],[2,"east"],[3,"west"]]}"#
    );
}

#[tokio::test]
async fn test_count_runs_unchanged() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    assert_eq!(
        guard.validate("SELECT COUNT(*) FROM orders").normalized_sql(),
        Some("SELECT COUNT(*) FROM orders")
    );

    match guard.execute_sql("SELECT COUNT(*) FROM orders").await {
        ToolResult::Rows { columns, rows } => {
            assert_eq!(columns, vec!["COUNT(*)".to_string()]);
            assert_eq!(rows, vec![vec![Value::Int(4)]]);
        }
        other => panic!("Expected rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lowercase_update_is_rejected() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let result = guard.execute_sql("update customers set region='X'").await;
    assert_eq!(
        result.as_text(),
        Some("ERROR: write operations are not allowed.")
    );

    let regions = guard
        .execute_sql("SELECT COUNT(*) FROM customers WHERE region = 'X'")
        .await;
    assert_eq!(serde_json::to_value(&regions).unwrap()["rows"], json!([[0]]));
}

#[tokio::test]
async fn test_missing_table_is_a_fault() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    assert!(guard
        .validate("SELECT * FROM nonexistent_table")
        .is_accepted());

    let result = guard.execute_sql("SELECT * FROM nonexistent_table").await;
    let text = result.as_text().unwrap();
    assert!(text.starts_with("ERROR: "), "{}", text);
    assert!(text.contains("nonexistent_table"), "{}", text);
}

#[tokio::test]
async fn test_empty_match_keeps_columns() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let result = guard
        .execute_sql("SELECT id, name FROM customers WHERE region = 'north'")
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"columns": ["id", "name"], "rows": []})
    );
}

#[tokio::test]
async fn test_join_with_existing_limit() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let sql = "SELECT c.name, o.status FROM customers c JOIN orders o ON o.customer_id = c.id ORDER BY o.id LIMIT 2";
    match guard.execute_sql(sql).await {
        ToolResult::Rows { columns, rows } => {
            assert_eq!(columns, vec!["name".to_string(), "status".to_string()]);
            assert_eq!(
                rows,
                vec![
                    vec![Value::from("Alice"), Value::from("paid")],
                    vec![Value::from("Alice"), Value::from("paid")],
                ]
            );
        }
        other => panic!("Expected rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_call_arguments() {
    let db = TestDatabase::seeded().await;
    let guard = db.guard().await;

    let result = guard
        .call(&json!({"sql": "SELECT name FROM products ORDER BY id"}))
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"columns": ["name"], "rows": [["Widget"], ["Gadget"]]})
    );

    let invalid = guard.call(&json!({"sql": 42})).await;
    assert!(invalid
        .as_text()
        .unwrap()
        .starts_with("ERROR: invalid tool input:"));
}

#[tokio::test]
async fn test_strict_checker_with_allow_list() {
    let db = TestDatabase::seeded().await;
    let mut config = Config::default();
    config.guard.checker = CheckerKind::Ast;
    config.guard.allowed_tables = Some(
        ["customers", "orders", "order_items", "products", "refunds", "payments"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    let guard = db.guard_with(&config).await;

    let result = guard.execute_sql("SELECT name FROM sqlite_master").await;
    assert_eq!(
        result.as_text(),
        Some("ERROR: table 'sqlite_master' is not in the allowed table list.")
    );

    let result = guard
        .execute_sql(
            "SELECT SUM(amount_cents) AS refunded FROM refunds WHERE payment_id IN (SELECT id FROM payments)",
        )
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"columns": ["refunded"], "rows": [[1250]]})
    );
}

#[tokio::test]
async fn test_custom_row_cap() {
    let db = TestDatabase::seeded().await;
    let mut config = Config::default();
    config.guard.row_cap = 2;
    let guard = db.guard_with(&config).await;

    match guard.execute_sql("SELECT id FROM orders ORDER BY id").await {
        ToolResult::Rows { rows, .. } => assert_eq!(rows.len(), 2),
        other => panic!("Expected rows, got {:?}", other),
    }
}
