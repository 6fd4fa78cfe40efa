//! PostgreSQL database client implementation.
//!
//! Statements are sent as unprepared text, which makes the server answer in
//! the text format. Every cell is therefore the server's own rendering of the
//! value, whatever its type.

use super::common::{check_capacity, connect_with_retry, map_execution_error, ACQUIRE_TIMEOUT};
use super::{ClientOptions, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ParityError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo};
use tracing::debug;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    max_rows: Option<usize>,
}

impl PostgresClient {
    /// Connects to the given `postgres://` URL.
    pub async fn connect(url: &str, options: &ClientOptions) -> Result<Self> {
        let pool = connect_with_retry("postgres", || {
            PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(url)
        })
        .await?;

        Ok(Self::from_pool(pool, options.max_rows))
    }

    /// Creates a client from an existing connection pool.
    pub fn from_pool(pool: PgPool, max_rows: Option<usize>) -> Self {
        Self { pool, max_rows }
    }

    /// Reads column metadata for a statement that returned no rows.
    ///
    /// Best effort: statements that cannot be prepared yield no header.
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
impl DatabaseClient for PostgresClient {
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

fn column_info(col: &sqlx::postgres::PgColumn) -> ColumnInfo {
    ColumnInfo::new(col.name(), col.type_info().name())
}

/// Converts a text-format PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    (0..row.columns().len())
        .map(|i| {
            row.try_get_unchecked::<Option<String>, _>(i)
                .map(Value::from)
                .map_err(|e| ParityError::query(format!("Failed to read column {i}: {e}")))
        })
        .collect()
}
