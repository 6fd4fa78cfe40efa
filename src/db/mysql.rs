//! MySQL database client implementation.
//!
//! Unprepared statements travel over the text protocol, so each cell arrives
//! as the server's textual rendering and is kept as raw bytes.

use super::common::{check_capacity, connect_with_retry, map_execution_error, ACQUIRE_TIMEOUT};
use super::{ClientOptions, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ParityError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlColumn, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo};
use tracing::debug;

/// MySQL (and MySQL-compatible) database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
    max_rows: Option<usize>,
}

impl MySqlClient {
    /// Connects to the given `mysql://` URL.
    pub async fn connect(url: &str, options: &ClientOptions) -> Result<Self> {
        let pool = connect_with_retry("mysql", || {
            MySqlPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(url)
        })
        .await?;

        Ok(Self::from_pool(pool, options.max_rows))
    }

    /// Creates a client from an existing connection pool.
    pub fn from_pool(pool: MySqlPool, max_rows: Option<usize>) -> Self {
        Self { pool, max_rows }
    }

    async fn describe_columns(&self, sql: &str) -> Vec<ColumnInfo> {
        match (&self.pool).prepare(sql).await {
            Ok(statement) => statement.columns().iter().map(column_info).collect(),
            Err(e) => {
                debug!("Could not describe empty result: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute_read(&self, sql: &str) -> Result<QueryResult> {
        let mut stream = (&self.pool).fetch(sql);
        let mut columns = None;
        let mut rows: Vec<Row> = Vec::new();

        while let Some(row) = stream.try_next().await.map_err(map_execution_error)? {
            check_capacity(rows.len(), self.max_rows)?;
            if columns.is_none() {
                columns = Some(row.columns().iter().map(column_info).collect());
            }
            rows.push(convert_row(&row)?);
        }
        drop(stream);

        let columns = match columns {
            Some(columns) => columns,
            None => self.describe_columns(sql).await,
        };

        Ok(QueryResult::with_data(columns, rows))
    }

    async fn execute_write(&self, sql: &str) -> Result<u64> {
        let result = (&self.pool)
            .execute(sql)
            .await
            .map_err(map_execution_error)?;
        Ok(result.rows_affected())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn column_info(col: &MySqlColumn) -> ColumnInfo {
    ColumnInfo::new(col.name(), col.type_info().name())
}

/// Converts a text-protocol MySqlRow to our Row type.
///
/// Values that are valid UTF-8 become strings; anything else stays binary.
fn convert_row(row: &MySqlRow) -> Result<Row> {
    (0..row.columns().len())
        .map(|i| {
            let raw = row
                .try_get_unchecked::<Option<Vec<u8>>, _>(i)
                .map_err(|e| ParityError::query(format!("Failed to read column {i}: {e}")))?;

            Ok(match raw {
                None => Value::Null,
                Some(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => Value::String(text),
                    Err(e) => Value::Bytes(e.into_bytes()),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running MySQL database.
    // They are skipped unless MYSQL_DATABASE_URL is set.

    async fn get_test_client() -> Option<MySqlClient> {
        let url = std::env::var("MYSQL_DATABASE_URL").ok()?;
        MySqlClient::connect(&url, &ClientOptions::default())
            .await
            .ok()
    }

    #[tokio::test]
    async fn test_execute_select_renders_text() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_read("SELECT 1 AS num, 'hello' AS greeting, NULL AS missing")
            .await
            .unwrap();

        assert_eq!(result.column_names(), vec!["num", "greeting", "missing"]);
        assert_eq!(result.rows[0][0], Value::from("1"));
        assert_eq!(result.rows[0][1], Value::from("hello"));
        assert!(result.rows[0][2].is_null());

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_query_with_error() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_DATABASE_URL not set");
            return;
        };

        let error = client
            .execute_read("SELECT * FROM nonexistent_table_xyz")
            .await
            .unwrap_err();
        assert!(matches!(error, ParityError::Query(_)));

        client.close().await.unwrap();
    }
}
