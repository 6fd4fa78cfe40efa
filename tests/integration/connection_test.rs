//! Connection provider integration tests.

use std::sync::Arc;

use db_parity::compare::{CompareMode, Comparator, DualRunner, FailurePolicy};
use db_parity::connection::ConnectionProvider;
use db_parity::db::ClientOptions;

fn sqlite_file_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("parity.db").display())
}

#[tokio::test]
async fn test_provider_shares_handle_between_sides() {
    let dir = tempfile::tempdir().unwrap();
    let url = sqlite_file_url(&dir);
    let provider = ConnectionProvider::new(ClientOptions::default());

    let a = provider.get(&url).await.unwrap();
    let b = provider.get(&url).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    a.execute_write("CREATE TABLE t (id INTEGER)").await.unwrap();
    a.execute_write("INSERT INTO t VALUES (1), (2)").await.unwrap();

    let dual = DualRunner::new(a, b).run("SELECT id FROM t ORDER BY id").await;
    let verdict = Comparator::new(CompareMode::Ordered, FailurePolicy::Lenient)
        .compare(&dual.a, &dual.b);
    assert!(verdict.is_consistent());

    provider.close_all().await.unwrap();
}

#[tokio::test]
async fn test_provider_keeps_sources_apart() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let provider = ConnectionProvider::default();

    let a = provider.get(&sqlite_file_url(&dir_a)).await.unwrap();
    let b = provider.get(&sqlite_file_url(&dir_b)).await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(provider.len().await, 2);

    a.execute_write("CREATE TABLE only_a (id INTEGER)").await.unwrap();
    assert!(b.execute_read("SELECT * FROM only_a").await.is_err());

    provider.close_all().await.unwrap();
    assert!(provider.is_empty().await);
}

#[tokio::test]
async fn test_closed_handle_fails_as_connection_error() {
    let provider = ConnectionProvider::default();
    let client = provider.get("sqlite::memory:").await.unwrap();
    provider.close_all().await.unwrap();

    let err = client.execute_read("SELECT 1").await.unwrap_err();
    assert!(err.is_connection(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_provider_rejects_unknown_scheme() {
    let provider = ConnectionProvider::default();
    let err = provider.get("oracle://localhost/orders").await.err().expect("expected an error");
    assert!(err.to_string().contains("Unsupported scheme"));
}
