//! Integration tests for db-guard.

pub mod concurrency_test;
pub mod guard_test;
pub mod postgres_test;
