//! Read-only admission control for SQL text.
//!
//! Classifies raw SQL as accepted or rejected before it can reach the database,
//! and normalizes accepted text (trailing semicolon removed, row cap appended).
//! Two checkers are provided behind the [`Checker`] trait:
//!
//! - [`PatternChecker`]: the lexical gate sequence. Deterministic and cheap, but
//!   blind to obfuscation it has no pattern for.
//! - [`AstChecker`]: runs the same gates, then parses the statement with
//!   sqlparser and rejects anything structurally unsafe. Never accepts text the
//!   pattern checker rejects.

mod parser;
mod pattern;

pub use parser::AstChecker;
pub use pattern::PatternChecker;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::db::DatabaseBackend;
use crate::error::Result;

/// Keywords that mark a statement as a write operation.
pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "REPLACE",
];

/// Markers that exempt a statement from row-cap injection.
pub const DEFAULT_AGGREGATE_MARKERS: &[&str] =
    &["COUNT(", "GROUP BY", "SUM(", "AVG(", "MAX(", "MIN("];

/// Row cap appended to unbounded statements.
pub const DEFAULT_ROW_CAP: u32 = 200;

/// Why a statement was refused.
///
/// The `Display` output is the reason string reported to the agent after the
/// `ERROR: ` prefix, so it must stay stable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// A data-modification or schema-definition keyword was found.
    #[error("write operations are not allowed.")]
    WriteOperationDetected,

    /// More than one statement was submitted.
    #[error("multiple statements are not allowed.")]
    MultiStatementDetected,

    /// The statement does not start with SELECT.
    #[error("only SELECT statements are allowed.")]
    NotASelectStatement,

    /// The statement references a table outside the configured allow-list.
    #[error("table '{0}' is not in the allowed table list.")]
    TableNotAllowed(String),

    /// The strict checker could not parse the statement.
    #[error("statement could not be parsed: {0}")]
    Unparseable(String),
}

/// Result of validating a single SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The statement may run; carries the normalized text.
    Accepted(String),
    /// The statement was refused before reaching the database.
    Rejected(PolicyViolation),
}

impl ValidationOutcome {
    /// Returns true if the statement was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Returns the normalized SQL if accepted.
    pub fn normalized_sql(&self) -> Option<&str> {
        match self {
            Self::Accepted(sql) => Some(sql),
            Self::Rejected(_) => None,
        }
    }

    /// Converts into a `Result`, for `?`-style handling at call sites.
    pub fn into_result(self) -> std::result::Result<String, PolicyViolation> {
        match self {
            Self::Accepted(sql) => Ok(sql),
            Self::Rejected(violation) => Err(violation),
        }
    }
}

/// A validator that decides whether SQL text may be executed.
///
/// Implementations must be deterministic: the same input always yields the
/// same outcome, and an accepted statement re-checked yields identical text.
pub trait Checker: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Validates and normalizes raw SQL text.
    fn check(&self, sql: &str) -> ValidationOutcome;
}

/// Which checker implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    /// Lexical gate sequence only.
    #[default]
    Pattern,
    /// Lexical gates followed by AST verification.
    Ast,
}

impl CheckerKind {
    /// Parses a checker kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pattern" => Some(Self::Pattern),
            "ast" | "strict" => Some(Self::Ast),
            _ => None,
        }
    }
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Ast => write!(f, "ast"),
        }
    }
}

/// Policy parameters shared by all checkers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Keywords rejected at a word boundary, case-insensitively.
    pub forbidden_keywords: Vec<String>,
    /// Row cap appended to statements without LIMIT or aggregates.
    pub row_cap: u32,
    /// Substrings that exempt a statement from the row cap.
    pub aggregate_markers: Vec<String>,
    /// When set, only these tables may appear after FROM/JOIN.
    pub allowed_tables: Option<Vec<String>>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            forbidden_keywords: DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            row_cap: DEFAULT_ROW_CAP,
            aggregate_markers: DEFAULT_AGGREGATE_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_tables: None,
        }
    }
}

impl GuardPolicy {
    /// Returns true if `table` is permitted by the allow-list.
    ///
    /// Matching is case-insensitive and ignores any schema qualifier, so
    /// `main.Customers` matches an allow-list entry of `customers`.
    pub fn table_allowed(&self, table: &str) -> bool {
        let Some(allowed) = &self.allowed_tables else {
            return true;
        };
        let bare = table
            .rsplit('.')
            .next()
            .unwrap_or(table)
            .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']');
        allowed.iter().any(|t| t.eq_ignore_ascii_case(bare))
    }
}

/// Builds the configured checker.
pub fn build_checker(
    kind: CheckerKind,
    policy: GuardPolicy,
    backend: DatabaseBackend,
) -> Result<Box<dyn Checker>> {
    Ok(match kind {
        CheckerKind::Pattern => Box::new(PatternChecker::new(policy)?),
        CheckerKind::Ast => Box::new(AstChecker::new(policy, backend)?),
    })
}

/// Validates SQL with the default policy and the pattern checker.
pub fn validate(sql: &str) -> ValidationOutcome {
    PatternChecker::default().check(sql)
}
