//! Captured outcomes of running one statement against one source.
//!
//! An outcome is built once per execution attempt and never changes
//! afterwards. A failed read carries no rows at all: the absence of a result
//! is not an empty result.

use crate::error::ParityError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::fmt;

use super::StatementKind;

/// One cell: the textual form of the value as bytes, `None` for NULL.
pub type Cell = Option<Vec<u8>>;

/// Signature encoding of NULL. Real values escape backslashes, so they can
/// never render as this marker.
const NULL_SIGNATURE: &str = "\\N";

/// Separator between cells of a row signature.
const CELL_SEPARATOR: char = '\t';

/// Multiset of row signatures, used for order-insensitive comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSignatures {
    counts: HashMap<String, usize>,
}

impl RowSignatures {
    fn insert(&mut self, signature: String) {
        *self.counts.entry(signature).or_insert(0) += 1;
    }

    /// Returns how many rows share `signature`.
    pub fn count(&self, signature: &str) -> usize {
        self.counts.get(signature).copied().unwrap_or(0)
    }

    /// Returns the number of distinct signatures.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Returns the total number of rows, duplicates included.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Materialized output of a successful read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
    signatures: RowSignatures,
}

impl RowSet {
    /// Column names, in order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Rows in the order the source returned them.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Signature multiset derived from `rows`.
    pub fn signatures(&self) -> &RowSignatures {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds a [`RowSet`], deriving row signatures as rows are pushed.
#[derive(Debug, Default)]
pub struct RowSetBuilder {
    inner: RowSet,
}

impl RowSetBuilder {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            inner: RowSet {
                header,
                ..RowSet::default()
            },
        }
    }

    /// Appends a row and records its signature.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.inner.signatures.insert(row_signature(&row));
        self.inner.rows.push(row);
    }

    /// Returns the number of rows pushed so far.
    pub fn len(&self) -> usize {
        self.inner.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rows.is_empty()
    }

    pub fn finish(self) -> RowSet {
        self.inner
    }
}

/// Encodes a row as a single string, unique per distinct row content.
pub fn row_signature(row: &[Cell]) -> String {
    let mut signature = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            signature.push(CELL_SEPARATOR);
        }
        match cell {
            None => signature.push_str(NULL_SIGNATURE),
            Some(bytes) => signature.push_str(&escape_cell(bytes)),
        }
    }
    signature
}

/// Escapes a cell so that separators and the NULL marker stay unambiguous.
///
/// Non UTF-8 bytes are encoded as `\b` followed by base64.
fn escape_cell(bytes: &[u8]) -> String {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return format!("\\b{}", STANDARD.encode(bytes));
    };

    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders a cell for humans: NULL as `NULL`, binary as base64.
pub fn display_cell(cell: &Cell) -> String {
    match cell {
        None => "NULL".to_string(),
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => format!("base64:{}", STANDARD.encode(bytes)),
        },
    }
}

/// Outcome of a read: the rows, or the failure that prevented them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome(Result<RowSet, ParityError>);

impl ReadOutcome {
    pub fn success(rows: RowSet) -> Self {
        Self(Ok(rows))
    }

    pub fn failure(error: ParityError) -> Self {
        Self(Err(error))
    }

    /// Rows, present only when the read succeeded.
    pub fn rows(&self) -> Option<&RowSet> {
        self.0.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ParityError> {
        self.0.as_ref().err()
    }
}

/// Outcome of a write: the affected-row count, or the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome(Result<u64, ParityError>);

impl WriteOutcome {
    pub fn success(affected_rows: u64) -> Self {
        Self(Ok(affected_rows))
    }

    pub fn failure(error: ParityError) -> Self {
        Self(Err(error))
    }

    /// Affected-row count, present only when the write succeeded.
    pub fn affected_rows(&self) -> Option<u64> {
        self.0.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&ParityError> {
        self.0.as_ref().err()
    }
}

/// The captured result of one statement against one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Read(ReadOutcome),
    Write(WriteOutcome),
}

impl Outcome {
    /// Builds a failed outcome of the given kind.
    pub fn failed(kind: StatementKind, error: ParityError) -> Self {
        match kind {
            StatementKind::Read => Self::Read(ReadOutcome::failure(error)),
            StatementKind::Write => Self::Write(WriteOutcome::failure(error)),
        }
    }

    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Read(_) => StatementKind::Read,
            Self::Write(_) => StatementKind::Write,
        }
    }

    /// The failure, if this side did not execute successfully.
    pub fn failure(&self) -> Option<&ParityError> {
        match self {
            Self::Read(read) => read.error(),
            Self::Write(write) => write.error(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure().is_some()
    }
}

/// Textual rendering handed to reporters: the header and rows of a read
/// (tab separated), the affected-row count of a write, or the failure.
impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = self.failure() {
            return write!(f, "{error}");
        }
        match self {
            Self::Write(write) => write!(f, "{}", write.affected_rows().unwrap_or_default()),
            Self::Read(read) => {
                let Some(rows) = read.rows() else {
                    return Ok(());
                };
                write!(f, "{}", rows.header().join("\t"))?;
                for row in rows.rows() {
                    let cells: Vec<String> = row.iter().map(display_cell).collect();
                    write!(f, "\n{}", cells.join("\t"))?;
                }
                Ok(())
            }
        }
    }
}
