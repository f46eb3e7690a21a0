//! Strict checker backed by sqlparser.
//!
//! Runs the lexical gates first, then parses the accepted text with a dialect
//! matching the backend and visits every node of the AST looking for anything
//! the patterns cannot see: unparseable text, hidden mutations
//! (`SELECT ... INTO`, mutating set expressions), and table references outside
//! the allow-list wherever they are nested.

use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use tracing::debug;

use crate::db::DatabaseBackend;
use crate::error::Result;

use super::{Checker, GuardPolicy, PatternChecker, PolicyViolation, ValidationOutcome};

/// Checker that verifies pattern-accepted statements structurally.
#[derive(Debug)]
pub struct AstChecker {
    pattern: PatternChecker,
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl AstChecker {
    /// Creates a strict checker for the given policy and backend dialect.
    pub fn new(policy: GuardPolicy, backend: DatabaseBackend) -> Result<Self> {
        let dialect: Box<dyn Dialect + Send + Sync> = match backend {
            DatabaseBackend::Sqlite => Box::new(SQLiteDialect {}),
            DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
        };
        Ok(Self {
            pattern: PatternChecker::new(policy)?,
            dialect,
        })
    }

    fn inspect(&self, sql: &str) -> std::result::Result<(), PolicyViolation> {
        let statements = Parser::parse_sql(self.dialect.as_ref(), sql)
            .map_err(|e| PolicyViolation::Unparseable(e.to_string()))?;

        let statement = match statements.as_slice() {
            [statement] => statement,
            [] => return Err(PolicyViolation::NotASelectStatement),
            _ => return Err(PolicyViolation::MultiStatementDetected),
        };

        if !matches!(statement, Statement::Query(_)) {
            return Err(PolicyViolation::NotASelectStatement);
        }

        let mut scan = QueryScan::default();
        let _ = statement.visit(&mut scan);

        if scan.mutates {
            return Err(PolicyViolation::WriteOperationDetected);
        }

        let policy = self.pattern.policy();
        if let Some(table) = scan
            .tables
            .into_iter()
            .filter(|t| !scan.cte_names.iter().any(|c| c.eq_ignore_ascii_case(t)))
            .find(|t| !policy.table_allowed(t))
        {
            return Err(PolicyViolation::TableNotAllowed(table));
        }

        Ok(())
    }
}

impl Checker for AstChecker {
    fn name(&self) -> &'static str {
        "ast"
    }

    fn check(&self, sql: &str) -> ValidationOutcome {
        let normalized = match self.pattern.check(sql) {
            ValidationOutcome::Accepted(normalized) => normalized,
            rejected => return rejected,
        };

        match self.inspect(&normalized) {
            Ok(()) => ValidationOutcome::Accepted(normalized),
            Err(violation) => {
                debug!(checker = self.name(), %violation, "Rejected statement");
                ValidationOutcome::Rejected(violation)
            }
        }
    }
}

/// Facts collected while visiting a statement.
#[derive(Debug, Default)]
struct QueryScan {
    tables: Vec<String>,
    cte_names: Vec<String>,
    mutates: bool,
}

impl Visitor for QueryScan {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            self.cte_names
                .extend(with.cte_tables.iter().map(|cte| cte.alias.name.value.clone()));
        }
        if body_mutates(&query.body) {
            self.mutates = true;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.tables.push(relation.to_string());
        ControlFlow::Continue(())
    }
}

/// Returns true if a query body writes. Nested queries are visited on their own.
fn body_mutates(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::Query(_) | SetExpr::Values(_) => false,
        SetExpr::SetOperation { left, right, .. } => body_mutates(left) || body_mutates(right),
        // INSERT/UPDATE bodies and anything newer: conservatively a write
        _ => true,
    }
}
