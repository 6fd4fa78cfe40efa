//! PostgreSQL comparisons.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use std::sync::Arc;

use db_parity::compare::{
    BatchDriver, CompareMode, Comparator, DualRunner, FailurePolicy, Mismatch,
};
use db_parity::db::{ClientOptions, DatabaseClient, PostgresClient, SqliteClient};
use db_parity::error::Result;

/// Helper to create a test client.
async fn get_test_client() -> Option<Arc<dyn DatabaseClient>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let client = PostgresClient::connect(&url, &ClientOptions::default())
        .await
        .ok()?;
    Some(Arc::new(client))
}

#[tokio::test]
async fn test_postgres_against_itself() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let batch = BatchDriver::new(
        DualRunner::new(Arc::clone(&client), Arc::clone(&client)),
        Comparator::new(CompareMode::Ordered, FailurePolicy::Strict),
    );
    let mut inconsistent = Vec::new();
    let mut reporter = |m: &Mismatch<'_>| -> Result<()> {
        inconsistent.push(m.sql.to_string());
        Ok(())
    };

    let summary = batch
        .run(
            &[
                "SELECT generate_series(1, 50) AS n",
                "SELECT now()::date, 1.50::numeric, 'x'::text, NULL::int",
                "SELECT 1 WHERE false",
                "SELECT * FROM table_that_does_not_exist",
            ],
            &mut reporter,
        )
        .await
        .unwrap();

    assert!(inconsistent.is_empty(), "unexpected: {inconsistent:?}");
    assert_eq!(summary.executed, 4);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_postgres_against_sqlite_text_rendering() {
    let Some(postgres) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let sqlite: Arc<dyn DatabaseClient> = Arc::new(
        SqliteClient::connect("sqlite::memory:", &ClientOptions::default())
            .await
            .unwrap(),
    );

    let dual = DualRunner::new(postgres, sqlite)
        .run("SELECT 42 AS answer, 'text' AS label, NULL AS nothing")
        .await;

    assert!(Comparator::default().compare(&dual.a, &dual.b).is_consistent());
}
