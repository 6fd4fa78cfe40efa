//! Statement classification.
//!
//! Decides whether a statement produces rows (Read) or an affected-row count
//! (Write). Classification is resolved once per statement through the
//! [`StatementClassifier`] trait, so the heuristic can be swapped without
//! touching execution or comparison.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// What a statement produces when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Produces rows.
    Read,
    /// Produces an affected-row count.
    Write,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Pluggable statement classification.
pub trait StatementClassifier: Send + Sync {
    fn classify(&self, sql: &str) -> StatementKind;
}

/// Which classifier to build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    #[default]
    Lexical,
    Parser,
}

impl ClassifierKind {
    pub fn build(self) -> Box<dyn StatementClassifier> {
        match self {
            Self::Lexical => Box::new(LexicalClassifier),
            Self::Parser => Box::new(ParserClassifier::new()),
        }
    }
}

impl std::str::FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "parser" => Ok(Self::Parser),
            _ => Err(format!(
                "Invalid classifier: {s}. Expected: lexical or parser"
            )),
        }
    }
}

/// Leading keywords that make a statement a write.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "MERGE", "UPSERT", "CREATE", "DROP", "ALTER",
    "TRUNCATE", "RENAME", "GRANT", "REVOKE", "LOAD",
];

/// Cheap keyword test on the first word of the statement.
///
/// Anything not recognized as a write is a read.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalClassifier;

impl StatementClassifier for LexicalClassifier {
    fn classify(&self, sql: &str) -> StatementKind {
        let keyword = first_keyword(sql);
        if WRITE_KEYWORDS
            .iter()
            .any(|w| keyword.eq_ignore_ascii_case(w))
        {
            StatementKind::Write
        } else {
            StatementKind::Read
        }
    }
}

/// Returns the first word of `sql`, skipping whitespace, comments and
/// opening parentheses.
fn first_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Classifier backed by a SQL parser.
///
/// Statements known to modify data are writes, and so are queries whose body
/// or CTEs modify data. Any other parsed statement is judged by the lexical
/// rule on its rendered text, so unrecognized statements stay reads.
/// Statements the parser rejects fall back to the lexical rule directly.
#[derive(Debug)]
pub struct ParserClassifier {
    dialect: GenericDialect,
}

impl Default for ParserClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserClassifier {
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }
}

impl StatementClassifier for ParserClassifier {
    fn classify(&self, sql: &str) -> StatementKind {
        match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) if !statements.is_empty() => {
                if statements.iter().any(is_write_statement) {
                    StatementKind::Write
                } else {
                    StatementKind::Read
                }
            }
            _ => LexicalClassifier.classify(sql),
        }
    }
}

fn is_write_statement(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => !is_read_query(query),
        Statement::Insert { .. }
        | Statement::Update { .. }
        | Statement::Delete { .. }
        | Statement::Merge { .. }
        | Statement::Copy { .. }
        | Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateSchema { .. }
        | Statement::Drop { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::Truncate { .. }
        | Statement::Grant { .. }
        | Statement::Revoke { .. } => true,
        other => LexicalClassifier.classify(&other.to_string()) == StatementKind::Write,
    }
}

/// A query is a read unless its body or one of its CTEs modifies data.
fn is_read_query(query: &Query) -> bool {
    let ctes_read = query
        .with
        .as_ref()
        .map_or(true, |with| with.cte_tables.iter().all(|cte| is_read_query(&cte.query)));

    ctes_read && is_read_set_expr(&query.body)
}

fn is_read_set_expr(body: &SetExpr) -> bool {
    match body {
        SetExpr::Insert(_) | SetExpr::Update(_) => false,
        SetExpr::Query(query) => is_read_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_set_expr(left) && is_read_set_expr(right)
        }
        _ => true,
    }
}
