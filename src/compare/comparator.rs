//! Consistency adjudication between two outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::outcome::{Outcome, ReadOutcome, RowSet, WriteOutcome};

/// How the rows of two reads are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Same row sequence, same cells at each position.
    #[default]
    Ordered,
    /// Same row multiset, regardless of sequence.
    Unordered,
}

impl std::str::FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ordered" => Ok(Self::Ordered),
            "unordered" => Ok(Self::Unordered),
            _ => Err(format!(
                "Invalid compare mode: {s}. Expected: ordered or unordered"
            )),
        }
    }
}

/// What two failed executions must share to count as consistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any two failures agree.
    #[default]
    Lenient,
    /// Failures agree only when their messages are identical.
    Strict,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            _ => Err(format!(
                "Invalid failure policy: {s}. Expected: lenient or strict"
            )),
        }
    }
}

/// The first difference found between two outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Exactly one side failed.
    FailurePresence { a_failed: bool, b_failed: bool },
    /// Both sides failed with different messages (strict policy only).
    FailureContent,
    /// One side read while the other wrote.
    KindMismatch,
    AffectedRows { a: u64, b: u64 },
    RowCount { a: usize, b: usize },
    /// Zero-based index of the first row that differs (ordered mode).
    RowContent { row: usize },
    /// Same row count but different row multisets (unordered mode).
    RowMultiset,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailurePresence { a_failed, b_failed } => write!(
                f,
                "only one source failed (A failed: {a_failed}, B failed: {b_failed})"
            ),
            Self::FailureContent => write!(f, "both sources failed with different errors"),
            Self::KindMismatch => write!(f, "sources produced different statement kinds"),
            Self::AffectedRows { a, b } => write!(f, "affected rows differ: {a} vs {b}"),
            Self::RowCount { a, b } => write!(f, "row counts differ: {a} vs {b}"),
            Self::RowContent { row } => write!(f, "row {} differs", row + 1),
            Self::RowMultiset => write!(f, "row contents differ"),
        }
    }
}

/// Result of adjudicating one pair of outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Consistent,
    Inconsistent(Divergence),
}

impl Verdict {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            Self::Consistent => None,
            Self::Inconsistent(d) => Some(d),
        }
    }
}

/// Decides whether two outcomes of the same statement agree.
///
/// Failure presence is checked first. Values are compared only when both
/// sides succeeded; headers are never compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Comparator {
    pub mode: CompareMode,
    pub failure_policy: FailurePolicy,
}

impl Comparator {
    pub fn new(mode: CompareMode, failure_policy: FailurePolicy) -> Self {
        Self {
            mode,
            failure_policy,
        }
    }

    pub fn compare(&self, a: &Outcome, b: &Outcome) -> Verdict {
        match (a.failure(), b.failure()) {
            (Some(ea), Some(eb)) => {
                if self.failure_policy == FailurePolicy::Strict && ea.to_string() != eb.to_string()
                {
                    return Verdict::Inconsistent(Divergence::FailureContent);
                }
                return Verdict::Consistent;
            }
            (None, None) => {}
            (ea, eb) => {
                return Verdict::Inconsistent(Divergence::FailurePresence {
                    a_failed: ea.is_some(),
                    b_failed: eb.is_some(),
                })
            }
        }

        let divergence = match (a, b) {
            (Outcome::Write(a), Outcome::Write(b)) => compare_writes(a, b),
            (Outcome::Read(a), Outcome::Read(b)) => self.compare_reads(a, b),
            _ => Some(Divergence::KindMismatch),
        };

        divergence.map_or(Verdict::Consistent, Verdict::Inconsistent)
    }

    fn compare_reads(&self, a: &ReadOutcome, b: &ReadOutcome) -> Option<Divergence> {
        let (Some(a), Some(b)) = (a.rows(), b.rows()) else {
            return None;
        };
        match self.mode {
            CompareMode::Ordered => compare_ordered(a, b),
            CompareMode::Unordered => compare_unordered(a, b),
        }
    }
}

fn compare_writes(a: &WriteOutcome, b: &WriteOutcome) -> Option<Divergence> {
    let (a, b) = (a.affected_rows()?, b.affected_rows()?);
    (a != b).then_some(Divergence::AffectedRows { a, b })
}

fn compare_ordered(a: &RowSet, b: &RowSet) -> Option<Divergence> {
    if a.len() != b.len() {
        return Some(Divergence::RowCount {
            a: a.len(),
            b: b.len(),
        });
    }
    a.rows()
        .iter()
        .zip(b.rows())
        .position(|(ra, rb)| ra != rb)
        .map(|row| Divergence::RowContent { row })
}

fn compare_unordered(a: &RowSet, b: &RowSet) -> Option<Divergence> {
    if a.signatures() == b.signatures() {
        return None;
    }
    if a.len() != b.len() {
        return Some(Divergence::RowCount {
            a: a.len(),
            b: b.len(),
        });
    }
    Some(Divergence::RowMultiset)
}
