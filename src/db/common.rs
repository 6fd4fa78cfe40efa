//! Helpers shared by the sqlx-backed clients.

use crate::error::{ParityError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// How long a caller waits for a pooled connection.
pub(crate) const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `attempt` until it succeeds, retrying transient connection errors
/// with exponential backoff.
pub(crate) async fn connect_with_retry<T, F, Fut>(target: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let mut n = 1;

    loop {
        debug!("Connection attempt {} of {} to {}", n, MAX_RETRY_ATTEMPTS, target);

        match attempt().await {
            Ok(pool) => {
                debug!("Connected to {}", target);
                return Ok(pool);
            }
            Err(e) if n < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                warn!(
                    "Connection attempt {} to {} failed (transient error), retrying in {:?}",
                    n, target, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2; // Exponential backoff
                n += 1;
            }
            Err(e) => return Err(ParityError::connection(format!("{target}: {e}"))),
        }
    }
}

/// Determines if an error is transient and worth retrying.
pub(crate) fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();

    // Authentication and database-not-found errors are not transient
    if error_str.contains("authentication failed")
        || error_str.contains("access denied")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps an sqlx error raised while running a statement.
///
/// Errors that mean the handle itself is unusable become `Connection`
/// errors; everything else is a `Query` error.
pub(crate) fn map_execution_error(error: sqlx::Error) -> ParityError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ParityError::connection(error.to_string()),
        other => ParityError::query(format_query_error(other)),
    }
}

/// Formats a query error with the database's detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(code) = db_error.code() {
        result.push_str(" (");
        result.push_str(&code);
        result.push(')');
    }

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}

/// Fails once a read has materialized `max_rows` rows and another arrives.
pub(crate) fn check_capacity(buffered: usize, max_rows: Option<usize>) -> Result<()> {
    match max_rows {
        Some(limit) if buffered >= limit => Err(ParityError::query(format!(
            "Result exceeds the configured capacity of {limit} rows"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(is_transient_error(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_row_not_found_is_not_transient() {
        assert!(!is_transient_error(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_connection_level_errors_map_to_connection() {
        assert!(map_execution_error(sqlx::Error::PoolClosed).is_connection());
        assert!(map_execution_error(sqlx::Error::PoolTimedOut).is_connection());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(map_execution_error(sqlx::Error::Io(io)).is_connection());
    }

    #[test]
    fn test_other_errors_map_to_query() {
        let err = map_execution_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, ParityError::Query(_)));
    }

    #[test]
    fn test_check_capacity() {
        assert!(check_capacity(1_000_000, None).is_ok());
        assert!(check_capacity(9, Some(10)).is_ok());
        let err = check_capacity(10, Some(10)).unwrap_err();
        assert!(err.to_string().contains("capacity of 10 rows"));
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up_on_permanent_error() {
        let mut calls = 0;
        let result: Result<()> = connect_with_retry("test", || {
            calls += 1;
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(result.unwrap_err().is_connection());
        assert_eq!(calls, 1);
    }
}
