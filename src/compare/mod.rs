//! Dual-execution comparison engine.
//!
//! A statement is classified once, executed against both sources
//! concurrently, and the two captured outcomes are adjudicated for
//! consistency. The batch driver repeats this over a list of statements and
//! hands every inconsistency to a reporter.

mod batch;
mod classify;
mod comparator;
mod executor;
mod outcome;
mod runner;

pub use batch::{BatchDriver, BatchSummary, Mismatch, MismatchReporter};
pub use classify::{
    ClassifierKind, LexicalClassifier, ParserClassifier, StatementClassifier, StatementKind,
};
pub use comparator::{CompareMode, Comparator, Divergence, FailurePolicy, Verdict};
pub use executor::{
    row_set_from_result, truncate_fractional_seconds, BackendExecutor, RelationalExecutor,
    WarehouseExecutor,
};
pub use outcome::{
    display_cell, row_signature, Cell, Outcome, ReadOutcome, RowSet, RowSetBuilder,
    RowSignatures, WriteOutcome,
};
pub use runner::{DualOutcome, DualRunner, Side};
