//! Dual execution of one statement against two sources.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classify::{LexicalClassifier, StatementClassifier, StatementKind};
use super::executor::{BackendExecutor, RelationalExecutor, WarehouseExecutor};
use super::outcome::Outcome;
use crate::db::DatabaseClient;
use crate::error::{ParityError, Result};
use crate::warehouse::WarehouseClient;

/// Identifies one side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "source A"),
            Self::B => write!(f, "source B"),
        }
    }
}

/// Both outcomes of one statement, produced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualOutcome {
    /// Classification shared by both sides.
    pub kind: StatementKind,
    pub a: Outcome,
    pub b: Outcome,
}

/// Runs a statement against source A and source B concurrently.
///
/// Reads may target a warehouse client on side B instead of the relational
/// handle; writes always run against both relational handles.
pub struct DualRunner {
    a: Arc<dyn DatabaseClient>,
    b: Arc<dyn DatabaseClient>,
    warehouse: Option<Arc<dyn WarehouseClient>>,
    classifier: Arc<dyn StatementClassifier>,
}

impl DualRunner {
    /// Creates a runner over two relational handles with the lexical classifier.
    pub fn new(a: Arc<dyn DatabaseClient>, b: Arc<dyn DatabaseClient>) -> Self {
        Self {
            a,
            b,
            warehouse: None,
            classifier: Arc::new(LexicalClassifier),
        }
    }

    /// Sends reads for side B to a warehouse client.
    pub fn with_warehouse(mut self, warehouse: Arc<dyn WarehouseClient>) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// Replaces the statement classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn StatementClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classify(&self, sql: &str) -> StatementKind {
        self.classifier.classify(sql)
    }

    /// Executes `sql` on both sides and waits for both outcomes.
    ///
    /// There is no timeout: if one side hangs, so does this call. Use
    /// [`DualRunner::run_cancellable`] to bound it.
    pub async fn run(&self, sql: &str) -> DualOutcome {
        let kind = self.classify(sql);
        debug!("Running {} statement on both sources", kind);

        let (a, b) = tokio::join!(self.run_side_a(sql, kind), self.run_side_b(sql, kind));

        log_connection_failure(Side::A, &a);
        log_connection_failure(Side::B, &b);

        DualOutcome { kind, a, b }
    }

    /// Like [`DualRunner::run`], but abandons both sides once `cancel` fires.
    ///
    /// Either both outcomes are returned or neither is.
    pub async fn run_cancellable(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<DualOutcome> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ParityError::Cancelled),
            outcome = self.run(sql) => Ok(outcome),
        }
    }

    async fn run_side_a(&self, sql: &str, kind: StatementKind) -> Outcome {
        RelationalExecutor::new(self.a.as_ref())
            .execute(sql, kind)
            .await
    }

    async fn run_side_b(&self, sql: &str, kind: StatementKind) -> Outcome {
        match (&self.warehouse, kind) {
            (Some(warehouse), StatementKind::Read) => {
                WarehouseExecutor::new(warehouse.as_ref())
                    .execute(sql, kind)
                    .await
            }
            _ => {
                RelationalExecutor::new(self.b.as_ref())
                    .execute(sql, kind)
                    .await
            }
        }
    }
}

fn log_connection_failure(side: Side, outcome: &Outcome) {
    if let Some(error) = outcome.failure().filter(|e| e.is_connection()) {
        warn!("Connection to {} failed: {}", side, error);
    }
}
