//! In-memory warehouse client for testing.

use super::{ColumnDescriptor, OperationState, WarehouseClient, WarehouseCursor, WarehouseRow};
use crate::db::Value;
use crate::error::{ParityError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Script {
    Rows {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<WarehouseRow>,
    },
    Fail(ParityError),
}

/// A warehouse client that answers scripted statements.
#[derive(Debug, Clone, Default)]
pub struct MockWarehouseClient {
    scripts: Arc<HashMap<String, Script>>,
    polls_before_finish: usize,
}

impl MockWarehouseClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a statement returning `rows`, given positionally in the order
    /// of `columns`.
    pub fn with_rows(
        mut self,
        sql: &str,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .map(|c| c.name.clone())
                    .zip(values)
                    .collect::<WarehouseRow>()
            })
            .collect();
        Arc::make_mut(&mut self.scripts)
            .insert(sql.trim().to_string(), Script::Rows { columns, rows });
        self
    }

    /// Scripts a statement whose execution fails.
    pub fn with_failure(mut self, sql: &str, error: ParityError) -> Self {
        Arc::make_mut(&mut self.scripts).insert(sql.trim().to_string(), Script::Fail(error));
        self
    }

    /// Makes every statement report `Running` this many times before finishing.
    pub fn with_polls_before_finish(mut self, polls: usize) -> Self {
        self.polls_before_finish = polls;
        self
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouseClient {
    async fn cursor(&self) -> Result<Box<dyn WarehouseCursor>> {
        Ok(Box::new(MockWarehouseCursor {
            scripts: Arc::clone(&self.scripts),
            polls_remaining: self.polls_before_finish,
            columns: Vec::new(),
            pending: VecDeque::new(),
            closed: false,
        }))
    }
}

/// Cursor handed out by [`MockWarehouseClient`].
#[derive(Debug)]
pub struct MockWarehouseCursor {
    scripts: Arc<HashMap<String, Script>>,
    polls_remaining: usize,
    columns: Vec<ColumnDescriptor>,
    pending: VecDeque<WarehouseRow>,
    closed: bool,
}

#[async_trait]
impl WarehouseCursor for MockWarehouseCursor {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(ParityError::connection("cursor is closed"));
        }
        match self.scripts.get(sql.trim()) {
            Some(Script::Rows { columns, rows }) => {
                self.columns = columns.clone();
                self.pending = rows.iter().cloned().collect();
                Ok(())
            }
            Some(Script::Fail(e)) => Err(e.clone()),
            None => Err(ParityError::query(format!(
                "no such statement: {}",
                sql.trim()
            ))),
        }
    }

    async fn status(&mut self) -> Result<OperationState> {
        if self.polls_remaining > 0 {
            self.polls_remaining -= 1;
            return Ok(OperationState::Running);
        }
        Ok(OperationState::Finished)
    }

    fn description(&self) -> Vec<ColumnDescriptor> {
        self.columns.clone()
    }

    async fn fetch_row(&mut self) -> Result<Option<WarehouseRow>> {
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cursor_yields_scripted_rows() {
        let client = MockWarehouseClient::new().with_rows(
            "SELECT id, ts FROM events",
            vec![
                ColumnDescriptor::new("id", "INT_TYPE"),
                ColumnDescriptor::new("ts", "TIMESTAMP_TYPE"),
            ],
            vec![vec![Value::Int(1), Value::from("2024-01-01 00:00:00.123")]],
        );

        let mut cursor = client.cursor().await.unwrap();
        cursor.execute("SELECT id, ts FROM events").await.unwrap();
        assert_eq!(cursor.status().await.unwrap(), OperationState::Finished);
        assert_eq!(cursor.description().len(), 2);
        assert!(cursor.description()[1].is_timestamp());

        let row = cursor.fetch_row().await.unwrap().unwrap();
        assert_eq!(row["id"], Value::Int(1));
        assert!(cursor.fetch_row().await.unwrap().is_none());
        cursor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_cursor_reports_running_before_finished() {
        let client = MockWarehouseClient::new().with_polls_before_finish(2);
        let mut cursor = client.cursor().await.unwrap();

        assert_eq!(cursor.status().await.unwrap(), OperationState::Running);
        assert_eq!(cursor.status().await.unwrap(), OperationState::Running);
        assert_eq!(cursor.status().await.unwrap(), OperationState::Finished);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = MockWarehouseClient::new()
            .with_failure("SELECT broken", ParityError::query("SemanticException"));
        let mut cursor = client.cursor().await.unwrap();

        let err = cursor.execute("SELECT broken").await.unwrap_err();
        assert!(err.to_string().contains("SemanticException"));
    }
}
