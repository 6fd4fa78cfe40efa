//! Backend executors.
//!
//! Each executor runs a statement against one source and captures the result
//! as an [`Outcome`]. Failures are captured inside the outcome and never
//! returned, so one side failing can never abort the comparison.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::outcome::{Cell, Outcome, ReadOutcome, RowSet, RowSetBuilder, WriteOutcome};
use super::StatementKind;
use crate::db::{DatabaseClient, QueryResult, Value};
use crate::error::{ParityError, Result};
use crate::warehouse::{ColumnDescriptor, OperationState, WarehouseClient, WarehouseCursor};

/// Interval between completion checks on a warehouse cursor.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs statements against one source.
#[async_trait]
pub trait BackendExecutor: Send + Sync {
    /// Executes `sql` as the given kind. Never fails; errors are captured.
    async fn execute(&self, sql: &str, kind: StatementKind) -> Outcome;
}

/// Executor for a standard relational handle.
pub struct RelationalExecutor<'a> {
    client: &'a dyn DatabaseClient,
}

impl<'a> RelationalExecutor<'a> {
    pub fn new(client: &'a dyn DatabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendExecutor for RelationalExecutor<'_> {
    async fn execute(&self, sql: &str, kind: StatementKind) -> Outcome {
        debug!("[sql] {}", sql);
        match kind {
            StatementKind::Write => Outcome::Write(match self.client.execute_write(sql).await {
                Ok(affected) => WriteOutcome::success(affected),
                Err(e) => WriteOutcome::failure(e),
            }),
            StatementKind::Read => Outcome::Read(match self.client.execute_read(sql).await {
                Ok(result) => ReadOutcome::success(row_set_from_result(result)),
                Err(e) => ReadOutcome::failure(e),
            }),
        }
    }
}

/// Normalizes a relational result into comparable cells.
pub fn row_set_from_result(result: QueryResult) -> RowSet {
    let mut builder = RowSetBuilder::new(result.column_names());
    for row in result.rows {
        builder.push_row(row.iter().map(Value::to_cell).collect());
    }
    builder.finish()
}

/// Executor for a cursor-based warehouse client. Reads only.
pub struct WarehouseExecutor<'a> {
    client: &'a dyn WarehouseClient,
}

impl<'a> WarehouseExecutor<'a> {
    pub fn new(client: &'a dyn WarehouseClient) -> Self {
        Self { client }
    }

    async fn read(&self, sql: &str) -> Result<RowSet> {
        let mut cursor = self.client.cursor().await?;
        let result = read_from_cursor(cursor.as_mut(), sql).await;
        if let Err(e) = cursor.close().await {
            debug!("Failed to close warehouse cursor: {}", e);
        }
        result
    }
}

#[async_trait]
impl BackendExecutor for WarehouseExecutor<'_> {
    async fn execute(&self, sql: &str, kind: StatementKind) -> Outcome {
        debug!("[sql] {}", sql);
        match kind {
            StatementKind::Write => Outcome::Write(WriteOutcome::failure(ParityError::query(
                "Warehouse sources only support read statements",
            ))),
            StatementKind::Read => Outcome::Read(match self.read(sql).await {
                Ok(rows) => ReadOutcome::success(rows),
                Err(e) => {
                    debug!("[output] {}", e);
                    ReadOutcome::failure(e)
                }
            }),
        }
    }
}

async fn read_from_cursor(cursor: &mut dyn WarehouseCursor, sql: &str) -> Result<RowSet> {
    cursor.execute(sql).await?;
    loop {
        match cursor.status().await? {
            OperationState::Finished => break,
            OperationState::Running => tokio::time::sleep(STATUS_POLL_INTERVAL).await,
            OperationState::Failed(message) => return Err(ParityError::query(message)),
        }
    }

    let columns = cursor.description();
    let mut builder = RowSetBuilder::new(columns.iter().map(|c| c.name.clone()).collect());

    debug!("[output]");
    while let Some(mut row) = cursor.fetch_row().await? {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|column| warehouse_cell(column, row.remove(&column.name)))
            .collect();
        debug!("{}", cells.iter().map(super::outcome::display_cell).collect::<Vec<_>>().join("\t"));
        builder.push_row(cells);
    }

    Ok(builder.finish())
}

/// Renders one warehouse value, dropping fractional seconds from timestamps.
fn warehouse_cell(column: &ColumnDescriptor, value: Option<Value>) -> Cell {
    let cell = value.unwrap_or_default().to_cell()?;
    if !column.is_timestamp() {
        return Some(cell);
    }
    match String::from_utf8(cell) {
        Ok(text) => Some(truncate_fractional_seconds(&text).as_bytes().to_vec()),
        Err(e) => Some(e.into_bytes()),
    }
}

/// Drops everything from the first `.`, so `2024-01-01 00:00:00.123`
/// compares equal to `2024-01-01 00:00:00`.
pub fn truncate_fractional_seconds(timestamp: &str) -> &str {
    timestamp
        .split_once('.')
        .map_or(timestamp, |(whole, _)| whole)
}
