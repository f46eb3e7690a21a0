//! Statement execution for db-guard.
//!
//! This module isolates running already-validated SQL against the pool from
//! validation and result formatting.

pub mod executor;

pub use executor::{ExecutionOutcome, QueryExecutor, DEFAULT_STATEMENT_TIMEOUT};
