//! Mismatch reporters.
//!
//! Write failures are returned as `Report` errors, which abort the batch.

use serde::Serialize;
use std::io::Write;

use crate::compare::{Mismatch, MismatchReporter, Outcome, StatementKind};
use crate::error::{ParityError, Result};

/// Writes each mismatch as a human-readable block.
pub struct TextReporter<W: Write> {
    out: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_mismatch(&mut self, m: &Mismatch<'_>) -> std::io::Result<()> {
        writeln!(
            self.out,
            "--- statement #{} ({}): {}",
            m.index + 1,
            m.kind,
            m.divergence
        )?;
        writeln!(self.out, "{}", m.sql)?;
        writeln!(self.out, "[source A]")?;
        writeln!(self.out, "{}", m.a)?;
        writeln!(self.out, "[source B]")?;
        writeln!(self.out, "{}", m.b)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> MismatchReporter for TextReporter<W> {
    fn report(&mut self, mismatch: &Mismatch<'_>) -> Result<()> {
        self.write_mismatch(mismatch)
            .map_err(|e| ParityError::report(format!("Failed to write report: {e}")))
    }
}

/// Writes each mismatch as one JSON object per line.
pub struct JsonReporter<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct JsonMismatch<'a> {
    index: usize,
    statement: &'a str,
    kind: StatementKind,
    divergence: String,
    a: JsonSide,
    b: JsonSide,
}

#[derive(Serialize)]
struct JsonSide {
    failed: bool,
    output: String,
}

impl JsonSide {
    fn from_outcome(outcome: &Outcome) -> Self {
        Self {
            failed: outcome.is_failure(),
            output: outcome.to_string(),
        }
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MismatchReporter for JsonReporter<W> {
    fn report(&mut self, m: &Mismatch<'_>) -> Result<()> {
        let record = JsonMismatch {
            index: m.index,
            statement: m.sql,
            kind: m.kind,
            divergence: m.divergence.to_string(),
            a: JsonSide::from_outcome(m.a),
            b: JsonSide::from_outcome(m.b),
        };
        serde_json::to_writer(&mut self.out, &record)
            .map_err(|e| ParityError::report(format!("Failed to write report: {e}")))?;
        writeln!(self.out)
            .and_then(|_| self.out.flush())
            .map_err(|e| ParityError::report(format!("Failed to write report: {e}")))
    }
}
