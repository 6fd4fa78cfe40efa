//! Batch driver: runs a list of statements through the dual runner and the
//! comparator, one statement at a time.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::StatementKind;
use super::comparator::{Comparator, Divergence, Verdict};
use super::outcome::Outcome;
use super::runner::{DualOutcome, DualRunner};
use crate::error::Result;

/// One inconsistent statement, as handed to a [`MismatchReporter`].
#[derive(Debug, Clone, Copy)]
pub struct Mismatch<'a> {
    /// Zero-based position of the statement in the batch input.
    pub index: usize,
    pub sql: &'a str,
    pub kind: StatementKind,
    pub a: &'a Outcome,
    pub b: &'a Outcome,
    pub divergence: &'a Divergence,
}

/// Receives every inconsistency found by a batch.
///
/// An error aborts the batch and is returned to its caller unchanged.
pub trait MismatchReporter {
    fn report(&mut self, mismatch: &Mismatch<'_>) -> Result<()>;
}

impl<F> MismatchReporter for F
where
    F: FnMut(&Mismatch<'_>) -> Result<()>,
{
    fn report(&mut self, mismatch: &Mismatch<'_>) -> Result<()> {
        self(mismatch)
    }
}

/// Counts gathered over one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Statements run against both sources.
    pub executed: usize,
    /// Blank statements skipped without running.
    pub skipped: usize,
    /// Statements reported as inconsistent.
    pub inconsistent: usize,
}

impl BatchSummary {
    pub fn is_consistent(&self) -> bool {
        self.inconsistent == 0
    }
}

pub struct BatchDriver {
    runner: DualRunner,
    comparator: Comparator,
}

impl BatchDriver {
    pub fn new(runner: DualRunner, comparator: Comparator) -> Self {
        Self { runner, comparator }
    }

    /// Runs every statement in order and reports each inconsistency.
    ///
    /// Statement N+1 starts only after statement N has been compared and
    /// reported.
    pub async fn run<S, R>(&self, statements: &[S], reporter: &mut R) -> Result<BatchSummary>
    where
        S: AsRef<str>,
        R: MismatchReporter + ?Sized,
    {
        self.run_inner(statements, reporter, None).await
    }

    /// Like [`BatchDriver::run`], but stops with `Cancelled` once `cancel`
    /// fires. The statement in flight at that point is not reported.
    pub async fn run_cancellable<S, R>(
        &self,
        statements: &[S],
        reporter: &mut R,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary>
    where
        S: AsRef<str>,
        R: MismatchReporter + ?Sized,
    {
        self.run_inner(statements, reporter, Some(cancel)).await
    }

    async fn run_inner<S, R>(
        &self,
        statements: &[S],
        reporter: &mut R,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchSummary>
    where
        S: AsRef<str>,
        R: MismatchReporter + ?Sized,
    {
        let mut summary = BatchSummary::default();

        for (index, statement) in statements.iter().enumerate() {
            let sql = statement.as_ref();
            if sql.trim().is_empty() {
                debug!("Skipping blank statement #{}", index + 1);
                summary.skipped += 1;
                continue;
            }

            let dual = match cancel {
                Some(token) => self.runner.run_cancellable(sql, token).await?,
                None => self.runner.run(sql).await,
            };
            summary.executed += 1;

            let DualOutcome { kind, a, b } = &dual;
            if let Verdict::Inconsistent(divergence) = self.comparator.compare(a, b) {
                info!("Statement #{} is inconsistent: {}", index + 1, divergence);
                summary.inconsistent += 1;
                reporter.report(&Mismatch {
                    index,
                    sql,
                    kind: *kind,
                    a,
                    b,
                    divergence: &divergence,
                })?;
            }
        }

        info!(
            "Batch finished: {} executed, {} skipped, {} inconsistent",
            summary.executed, summary.skipped, summary.inconsistent
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{CompareMode, FailurePolicy};
    use crate::db::{MockDatabaseClient, Value};
    use crate::error::ParityError;
    use std::sync::Arc;
    use std::time::Duration;

    const SELECT: &str = "SELECT id FROM t ORDER BY id";
    const UPDATE: &str = "UPDATE t SET v=1 WHERE id=1";

    fn ids(values: &[i64]) -> Vec<Vec<Value>> {
        values.iter().map(|v| vec![Value::Int(*v)]).collect()
    }

    fn driver(a: MockDatabaseClient, b: MockDatabaseClient, mode: CompareMode) -> BatchDriver {
        BatchDriver::new(
            DualRunner::new(Arc::new(a), Arc::new(b)),
            Comparator::new(mode, FailurePolicy::Lenient),
        )
    }

    #[tokio::test]
    async fn test_permuted_select_and_matching_update_are_consistent() {
        let a = MockDatabaseClient::new()
            .with_rows(SELECT, &["id"], ids(&[1, 2, 3]))
            .with_affected(UPDATE, 1);
        let b = MockDatabaseClient::new()
            .with_rows(SELECT, &["id"], ids(&[2, 1, 3]))
            .with_affected(UPDATE, 1);

        let mut calls = 0;
        let mut reporter = |_: &Mismatch<'_>| -> Result<()> {
            calls += 1;
            Ok(())
        };

        let summary = driver(a, b, CompareMode::Unordered)
            .run(&[SELECT, "", UPDATE], &mut reporter)
            .await
            .unwrap();

        assert_eq!(calls, 0);
        assert_eq!(
            summary,
            BatchSummary {
                executed: 2,
                skipped: 1,
                inconsistent: 0
            }
        );
    }

    #[tokio::test]
    async fn test_each_inconsistency_is_reported() {
        let a = MockDatabaseClient::new()
            .with_rows(SELECT, &["id"], ids(&[1, 2]))
            .with_affected(UPDATE, 1);
        let b = MockDatabaseClient::new()
            .with_rows(SELECT, &["id"], ids(&[2, 1]))
            .with_affected(UPDATE, 0);

        let mut reported = Vec::new();
        let mut reporter = |m: &Mismatch<'_>| -> Result<()> {
            reported.push((m.index, m.sql.to_string(), m.divergence.clone()));
            Ok(())
        };

        let summary = driver(a, b, CompareMode::Ordered)
            .run(&[SELECT, "  ", UPDATE], &mut reporter)
            .await
            .unwrap();

        assert_eq!(summary.inconsistent, 2);
        assert_eq!(
            reported,
            vec![
                (0, SELECT.to_string(), Divergence::RowContent { row: 0 }),
                (2, UPDATE.to_string(), Divergence::AffectedRows { a: 1, b: 0 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_reporter_failure_stops_the_batch() {
        let a = Arc::new(
            MockDatabaseClient::new()
                .with_affected("DELETE FROM t", 1)
                .with_affected(UPDATE, 1),
        );
        let b = Arc::new(
            MockDatabaseClient::new()
                .with_affected("DELETE FROM t", 2)
                .with_affected(UPDATE, 1),
        );
        let batch = BatchDriver::new(
            DualRunner::new(a.clone(), b.clone()),
            Comparator::default(),
        );

        let mut reporter =
            |_: &Mismatch<'_>| -> Result<()> { Err(ParityError::report("sink closed")) };

        let err = batch
            .run(&["DELETE FROM t", UPDATE], &mut reporter)
            .await
            .unwrap_err();

        assert_eq!(err, ParityError::report("sink closed"));
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 1);
    }

    #[tokio::test]
    async fn test_both_failures_are_consistent_by_default() {
        let a = MockDatabaseClient::new().with_failure(SELECT, ParityError::query("no table t"));
        let b = MockDatabaseClient::new()
            .with_failure(SELECT, ParityError::query("relation t does not exist"));

        let mut reporter = |_: &Mismatch<'_>| -> Result<()> { panic!("nothing to report") };
        let summary = driver(a, b, CompareMode::Ordered)
            .run(&[SELECT], &mut reporter)
            .await
            .unwrap();

        assert!(summary.is_consistent());
    }

    #[tokio::test]
    async fn test_run_cancellable_stops_on_hung_statement() {
        let a = MockDatabaseClient::new().with_rows(SELECT, &["id"], ids(&[1]));
        let b = MockDatabaseClient::new()
            .with_rows(SELECT, &["id"], ids(&[1]))
            .with_delay(Duration::from_secs(3600));
        let batch = driver(a, b, CompareMode::Ordered);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut reporter = |_: &Mismatch<'_>| -> Result<()> { Ok(()) };
        let err = batch
            .run_cancellable(&[SELECT], &mut reporter, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, ParityError::Cancelled);
    }
}
