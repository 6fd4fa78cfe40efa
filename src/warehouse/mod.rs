//! Warehouse client interface.
//!
//! A columnar or warehouse system is reached through a native cursor client
//! rather than a full relational driver. Only what the read path needs is
//! modeled: open a cursor, run a statement, wait for completion, read the
//! column descriptors and then pull materialized rows one at a time.

mod mock;

pub use mock::{MockWarehouseClient, MockWarehouseCursor};

use crate::db::Value;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Type tag warehouse clients use for timestamp columns.
pub const TIMESTAMP_TYPE_TAG: &str = "TIMESTAMP_TYPE";

/// Name and type tag of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name, also the key of every fetched row.
    pub name: String,
    /// Backend type tag (e.g. `STRING_TYPE`, `TIMESTAMP_TYPE`).
    pub type_tag: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Returns true if values of this column carry sub-second precision that
    /// must be dropped before comparison.
    pub fn is_timestamp(&self) -> bool {
        self.type_tag.eq_ignore_ascii_case(TIMESTAMP_TYPE_TAG)
    }
}

/// One materialized row, keyed by column name.
pub type WarehouseRow = HashMap<String, Value>;

/// Completion state of a statement submitted through a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Finished,
    Failed(String),
}

/// A warehouse connection able to hand out cursors.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Opens a new cursor.
    async fn cursor(&self) -> Result<Box<dyn WarehouseCursor>>;
}

/// A cursor over a single statement's results.
///
/// The error of `execute` is the cursor's error state; it is inspected before
/// any row is fetched.
#[async_trait]
pub trait WarehouseCursor: Send {
    /// Submits a statement.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Reports whether the submitted statement has completed.
    async fn status(&mut self) -> Result<OperationState>;

    /// Describes the result columns, in order.
    fn description(&self) -> Vec<ColumnDescriptor>;

    /// Fetches the next row, `None` once the result is exhausted.
    async fn fetch_row(&mut self) -> Result<Option<WarehouseRow>>;

    /// Releases the cursor.
    async fn close(&mut self) -> Result<()>;
}
