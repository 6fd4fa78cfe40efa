//! Mock database clients for testing.
//!
//! Provides scripted in-memory handles so comparisons can be exercised
//! without a running database.

use super::{ColumnInfo, DatabaseClient, QueryResult, Row};
use crate::error::{ParityError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A canned answer for one statement.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The statement returns these rows.
    Rows(QueryResult),
    /// The statement modifies this many rows.
    Affected(u64),
    /// The statement fails.
    Fail(ParityError),
}

/// A mock database client that returns predefined results per statement.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    responses: HashMap<String, MockResponse>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with no scripted statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for a statement.
    pub fn with_response(mut self, sql: &str, response: MockResponse) -> Self {
        self.responses.insert(sql.trim().to_string(), response);
        self
    }

    /// Scripts a read that returns `rows` under the given column names.
    pub fn with_rows(self, sql: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        let columns = columns
            .iter()
            .map(|name| ColumnInfo::new(*name, "TEXT"))
            .collect();
        self.with_response(sql, MockResponse::Rows(QueryResult::with_data(columns, rows)))
    }

    /// Scripts a write that affects `count` rows.
    pub fn with_affected(self, sql: &str, count: u64) -> Self {
        self.with_response(sql, MockResponse::Affected(count))
    }

    /// Scripts a statement that fails with `error`.
    pub fn with_failure(self, sql: &str, error: ParityError) -> Self {
        self.with_response(sql, MockResponse::Fail(error))
    }

    /// Delays every call, to simulate a slow or hung source.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many statements have been executed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, sql: &str) -> Result<&MockResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .get(sql.trim())
            .ok_or_else(|| ParityError::query(format!("no such statement: {}", sql.trim())))
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_read(&self, sql: &str) -> Result<QueryResult> {
        match self.respond(sql).await? {
            MockResponse::Rows(result) => Ok(result.clone()),
            MockResponse::Affected(_) => Ok(QueryResult::new()),
            MockResponse::Fail(e) => Err(e.clone()),
        }
    }

    async fn execute_write(&self, sql: &str) -> Result<u64> {
        match self.respond(sql).await? {
            MockResponse::Affected(count) => Ok(*count),
            MockResponse::Rows(_) => Ok(0),
            MockResponse::Fail(e) => Err(e.clone()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A client whose connection is always broken.
#[derive(Debug, Default)]
pub struct FailingDatabaseClient;

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn execute_read(&self, _sql: &str) -> Result<QueryResult> {
        Err(ParityError::connection("bad connection"))
    }

    async fn execute_write(&self, _sql: &str) -> Result<u64> {
        Err(ParityError::connection("bad connection"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;

    #[tokio::test]
    async fn test_mock_scripted_read() {
        let client = MockDatabaseClient::new().with_rows(
            "SELECT id FROM t",
            &["id"],
            vec![vec![Value::Int(1)]],
        );

        let result = client.execute_read("  SELECT id FROM t ").await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_write_and_failure() {
        let client = MockDatabaseClient::new()
            .with_affected("DELETE FROM t", 4)
            .with_failure("DROP TABLE t", ParityError::query("permission denied"));

        assert_eq!(client.execute_write("DELETE FROM t").await.unwrap(), 4);
        assert!(client.execute_write("DROP TABLE t").await.is_err());
        assert!(client.execute_read("SELECT 2").await.is_err());
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_client_reports_connection_errors() {
        let client = FailingDatabaseClient;
        assert!(client.execute_read("SELECT 1").await.unwrap_err().is_connection());
        assert!(client.execute_write("DELETE FROM t").await.unwrap_err().is_connection());
    }
}
