//! SQLite database client implementation.
//!
//! SQLite has no text protocol, so values are decoded by their storage
//! class and rendered afterwards.

use super::common::{check_capacity, connect_with_retry, map_execution_error, ACQUIRE_TIMEOUT};
use super::{ClientOptions, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ParityError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteColumn, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::debug;

/// Acquire timeout for the single shared connection of an in-memory
/// database. Callers queue behind each other's statements, so a wait there
/// is not a pool failure.
const SHARED_CONNECTION_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    max_rows: Option<usize>,
}

impl SqliteClient {
    /// Connects to the given `sqlite:` URL.
    ///
    /// In-memory databases live as long as their single connection, so the
    /// pool keeps exactly one connection open for them.
    pub async fn connect(url: &str, options: &ClientOptions) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let max_connections = if in_memory { 1 } else { options.max_connections };

        let pool = connect_with_retry("sqlite", || {
            let mut pool_options = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(acquire_timeout(in_memory));
            if in_memory {
                pool_options = pool_options
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
            }
            pool_options.connect(url)
        })
        .await?;

        Ok(Self::from_pool(pool, options.max_rows))
    }

    /// Creates a client from an existing connection pool.
    pub fn from_pool(pool: SqlitePool, max_rows: Option<usize>) -> Self {
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

fn acquire_timeout(single_connection: bool) -> Duration {
    if single_connection {
        SHARED_CONNECTION_ACQUIRE_TIMEOUT
    } else {
        ACQUIRE_TIMEOUT
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
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

fn column_info(col: &SqliteColumn) -> ColumnInfo {
    ColumnInfo::new(col.name(), col.type_info().name())
}

fn convert_row(row: &SqliteRow) -> Result<Row> {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes one cell according to the storage class of the stored value.
fn convert_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ParityError::query(format!("Failed to read column {index}: {e}")))?;

    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage_class = raw.type_info().name().to_string();
    let decoded = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(Value::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(Value::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Bytes),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded.map_err(|e| ParityError::query(format!("Failed to read column {index}: {e}")))
}
