//! Concurrent tool calls sharing one guard and pool.

use std::sync::Arc;

use db_guard::config::Config;
use db_guard::tool::ToolResult;
use futures::future::join_all;

use super::common::TestDatabase;

#[tokio::test]
async fn test_concurrent_calls_share_the_pool() {
    let db = TestDatabase::seeded().await;
    let mut config = Config::default();
    config.database.max_connections = 2;
    let guard = Arc::new(db.guard_with(&config).await);

    let calls = (0..16).map(|i| {
        let guard = Arc::clone(&guard);
        async move {
            if i % 4 == 0 {
                guard.execute_sql("DROP TABLE customers").await
            } else {
                guard
                    .execute_sql("SELECT id FROM customers ORDER BY id")
                    .await
            }
        }
    });
    let results = join_all(calls).await;

    for (i, result) in results.iter().enumerate() {
        if i % 4 == 0 {
            assert_eq!(
                result.as_text(),
                Some("ERROR: write operations are not allowed.")
            );
        } else {
            match result {
                ToolResult::Rows { rows, .. } => assert_eq!(rows.len(), 3),
                other => panic!("Call {} expected rows, got {:?}", i, other),
            }
        }
    }

    guard.close().await.unwrap();
}

#[tokio::test]
async fn test_calls_from_spawned_tasks() {
    let db = TestDatabase::seeded().await;
    let guard = Arc::new(db.guard().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.execute_sql("SELECT COUNT(*) FROM payments").await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(
            serde_json::to_value(&result).unwrap()["rows"],
            serde_json::json!([[3]])
        );
    }
}
