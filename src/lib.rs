//! db-guard - read-only SQL guard for agent tool calls.
//!
//! This library exposes the core modules for embedding and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod logging;
pub mod query;
pub mod safety;
pub mod tool;

pub use guard::SqlGuard;
pub use tool::ToolResult;
