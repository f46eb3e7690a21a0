//! Lexical gate sequence for read-only SQL.
//!
//! Gates run in a fixed order and the first failing gate decides the rejection
//! reason, so a statement that is both a write and a multi-statement chain is
//! always reported as a write.

use regex::Regex;
use tracing::debug;

use crate::error::{GuardError, Result};

use super::{Checker, GuardPolicy, PolicyViolation, ValidationOutcome};

/// Clause boundaries that end a comma-separated FROM list.
const FROM_LIST_PATTERN: &str = r"(?is)\bfrom\s+(.*?)(?:\bwhere\b|\bgroup\b|\border\b|\blimit\b|\bhaving\b|\bunion\b|\bintersect\b|\bexcept\b|\bwindow\b|\bjoin\b|\binner\b|\bleft\b|\bright\b|\bfull\b|\bcross\b|\bnatural\b|\bon\b|[()]|$)";

/// Pattern-based checker implementing the gate sequence.
#[derive(Debug)]
pub struct PatternChecker {
    policy: GuardPolicy,
    forbidden: Option<Regex>,
    select_prefix: Regex,
    limit_clause: Regex,
    aggregate: Option<Regex>,
    from_list: Regex,
    join_target: Regex,
}

impl Default for PatternChecker {
    fn default() -> Self {
        Self::new(GuardPolicy::default()).expect("default guard policy compiles")
    }
}

impl PatternChecker {
    /// Compiles a checker for the given policy.
    pub fn new(policy: GuardPolicy) -> Result<Self> {
        if policy.row_cap == 0 {
            return Err(GuardError::config("row_cap must be greater than zero"));
        }

        let forbidden = keyword_regex(&policy.forbidden_keywords)?;
        let aggregate = marker_regex(&policy.aggregate_markers)?;

        Ok(Self {
            policy,
            forbidden,
            select_prefix: compile(r"(?is)^\s*select\b")?,
            limit_clause: compile(r"(?i)\blimit\s+\d+\b")?,
            aggregate,
            from_list: compile(FROM_LIST_PATTERN)?,
            join_target: compile(r"(?i)\bjoin\s+([^\s(),]+)")?,
        })
    }

    /// Returns the policy this checker enforces.
    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Returns the first referenced table that the allow-list rejects.
    fn disallowed_table(&self, text: &str) -> Option<String> {
        self.policy.allowed_tables.as_ref()?;
        referenced_tables(&self.from_list, &self.join_target, text)
            .into_iter()
            .find(|table| !self.policy.table_allowed(table))
    }

    /// Returns true if the statement should get the row cap appended.
    fn needs_row_cap(&self, text: &str) -> bool {
        if self.limit_clause.is_match(text) {
            return false;
        }
        match &self.aggregate {
            Some(aggregate) => !aggregate.is_match(text),
            None => true,
        }
    }
}

impl Checker for PatternChecker {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn check(&self, sql: &str) -> ValidationOutcome {
        let text = normalize(sql);

        let violation = if self.forbidden.as_ref().is_some_and(|re| re.is_match(text)) {
            Some(PolicyViolation::WriteOperationDetected)
        } else if text.contains(';') {
            Some(PolicyViolation::MultiStatementDetected)
        } else if !self.select_prefix.is_match(text) {
            Some(PolicyViolation::NotASelectStatement)
        } else {
            self.disallowed_table(text)
                .map(PolicyViolation::TableNotAllowed)
        };

        if let Some(violation) = violation {
            debug!(checker = self.name(), %violation, "Rejected statement");
            return ValidationOutcome::Rejected(violation);
        }

        if self.needs_row_cap(text) {
            debug!(row_cap = self.policy.row_cap, "Appending row cap");
            ValidationOutcome::Accepted(format!("{text} LIMIT {}", self.policy.row_cap))
        } else {
            ValidationOutcome::Accepted(text.to_string())
        }
    }
}

/// Trims whitespace and strips a single trailing semicolon.
pub fn normalize(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Extracts table names following FROM (including comma lists) and JOIN.
///
/// A FROM only starts a table list at the top level of a statement or directly
/// inside a parenthesized subquery. FROM inside other parentheses
/// (`EXTRACT(YEAR FROM d)`, `TRIM(x FROM y)`) and the FROM of
/// `IS [NOT] DISTINCT FROM` are operators, not table lists.
fn referenced_tables(from_list: &Regex, join_target: &Regex, text: &str) -> Vec<String> {
    let mut tables = Vec::new();

    for caps in from_list.captures_iter(text) {
        let Some(keyword) = caps.get(0) else {
            continue;
        };
        if !opens_table_list(text, keyword.start()) {
            continue;
        }
        for item in caps[1].split(',') {
            if let Some(name) = item.split_whitespace().next().filter(|n| is_table_name(n)) {
                tables.push(name.to_string());
            }
        }
    }

    for caps in join_target.captures_iter(text) {
        if is_table_name(&caps[1]) {
            tables.push(caps[1].to_string());
        }
    }

    tables
}

/// Returns true if the FROM at byte offset `at` introduces a table list.
fn opens_table_list(text: &str, at: usize) -> bool {
    let before = &text[..at];
    if before
        .split_whitespace()
        .next_back()
        .is_some_and(|word| word.eq_ignore_ascii_case("distinct"))
    {
        return false;
    }
    match innermost_open_paren(before) {
        None => true,
        Some(open) => starts_with_select(&before[open + 1..]),
    }
}

/// Returns the byte offset of the innermost unclosed `(`, skipping string
/// literals.
fn innermost_open_paren(text: &str) -> Option<usize> {
    let mut open = Vec::new();
    let mut in_literal = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => open.push(i),
            ')' if !in_literal => {
                open.pop();
            }
            _ => {}
        }
    }
    open.pop()
}

fn starts_with_select(text: &str) -> bool {
    let rest = text.trim_start();
    rest.get(..6)
        .is_some_and(|word| word.eq_ignore_ascii_case("select"))
        && !rest[6..].starts_with(|c: char| c.is_alphanumeric() || c == '_')
}

/// Literals and numbers are never table names.
fn is_table_name(token: &str) -> bool {
    !token.is_empty() && !token.starts_with(|c: char| c == '\'' || c.is_ascii_digit())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GuardError::config(format!("Invalid guard pattern: {e}")))
}

/// Builds `\b(?:KW1|KW2|...)\b`, or `None` if there are no keywords.
fn keyword_regex(keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    compile(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).map(Some)
}

/// Builds an alternation of aggregate markers.
///
/// Interior whitespace matches any run of whitespace, and word boundaries are
/// added on whichever ends of the marker are word characters, so `GROUP BY`
/// becomes `\bGROUP\s+BY\b` and `COUNT(` becomes `\bCOUNT\(`.
fn marker_regex(markers: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = markers
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|marker| {
            let body = marker
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
            let lead = if is_word(marker.chars().next()) { r"\b" } else { "" };
            let tail = if is_word(marker.chars().last()) { r"\b" } else { "" };
            format!("{lead}{body}{tail}")
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    compile(&format!("(?i){}", alternatives.join("|"))).map(Some)
}
