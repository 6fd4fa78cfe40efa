//! Database abstraction layer for db-parity.
//!
//! Provides a trait-based interface over the relational backends a statement
//! can be replayed against, allowing sources of different families to be
//! compared interchangeably.

mod common;
mod mock;
mod mysql;
mod postgres;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient, MockResponse};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::{ParityError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Default pool size per source.
///
/// At most two executions of a single statement share a handle at once.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    MySql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Determines the backend from a connection URL's scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| ParityError::config(format!("Missing scheme in '{url}'")))?;

        Self::parse(scheme).ok_or_else(|| {
            ParityError::config(format!(
                "Unsupported scheme '{scheme}'. Expected postgres, mysql or sqlite"
            ))
        })
    }
}

/// Options applied to every client created for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Maximum pooled connections per source.
    pub max_connections: u32,

    /// Maximum rows a read may materialize before it fails.
    ///
    /// `None` buffers the whole result set in memory.
    pub max_rows: Option<usize>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_rows: None,
        }
    }
}

/// Creates a database client for the given connection URL.
///
/// This is the central factory function for database connections.
pub async fn connect(url: &str, options: &ClientOptions) -> Result<Arc<dyn DatabaseClient>> {
    match DatabaseBackend::from_url(url)? {
        DatabaseBackend::Postgres => Ok(Arc::new(PostgresClient::connect(url, options).await?)),
        DatabaseBackend::MySql => Ok(Arc::new(MySqlClient::connect(url, options).await?)),
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteClient::connect(url, options).await?)),
    }
}

/// Trait defining the interface for a ready-to-use connection handle.
///
/// Implementations must be safe for two concurrent callers.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a statement that produces rows and materializes all of them.
    async fn execute_read(&self, sql: &str) -> Result<QueryResult>;

    /// Executes a statement that modifies data and returns the affected-row count.
    async fn execute_write(&self, sql: &str) -> Result<u64>;

    /// Closes the underlying pool.
    async fn close(&self) -> Result<()>;
}
