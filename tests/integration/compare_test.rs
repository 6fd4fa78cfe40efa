//! End-to-end comparisons between two independent SQLite databases.

use std::sync::Arc;

use db_parity::compare::{
    BatchDriver, BatchSummary, CompareMode, Comparator, Divergence, DualRunner, FailurePolicy,
    Mismatch,
};
use db_parity::db::{ClientOptions, DatabaseClient, SqliteClient};
use db_parity::error::Result;
use db_parity::report::TextReporter;

/// Opens a fresh in-memory database and runs `setup` against it.
async fn seeded(setup: &[&str]) -> Arc<dyn DatabaseClient> {
    let client = SqliteClient::connect("sqlite::memory:", &ClientOptions::default())
        .await
        .unwrap();
    for sql in setup {
        client.execute_write(sql).await.unwrap();
    }
    Arc::new(client)
}

fn driver(a: Arc<dyn DatabaseClient>, b: Arc<dyn DatabaseClient>, mode: CompareMode) -> BatchDriver {
    BatchDriver::new(
        DualRunner::new(a, b),
        Comparator::new(mode, FailurePolicy::Lenient),
    )
}

/// Runs `statements` and collects every reported mismatch as
/// (index, divergence).
async fn collect(
    batch: &BatchDriver,
    statements: &[&str],
) -> (BatchSummary, Vec<(usize, Divergence)>) {
    let mut found = Vec::new();
    let mut reporter = |m: &Mismatch<'_>| -> Result<()> {
        found.push((m.index, m.divergence.clone()));
        Ok(())
    };
    let summary = batch.run(statements, &mut reporter).await.unwrap();
    (summary, found)
}

const SCHEMA: &str = "CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER, name TEXT)";

#[tokio::test]
async fn test_identical_sources_with_blank_statement() {
    let a = seeded(&[
        SCHEMA,
        "INSERT INTO t (id, v, name) VALUES (1, 0, 'one'), (2, 0, 'two'), (3, 0, NULL)",
    ])
    .await;
    let b = seeded(&[
        SCHEMA,
        "INSERT INTO t (id, v, name) VALUES (3, 0, NULL), (1, 0, 'one'), (2, 0, 'two')",
    ])
    .await;

    let batch = driver(a, b, CompareMode::Unordered);
    let (summary, found) = collect(
        &batch,
        &["SELECT id FROM t ORDER BY id", "", "UPDATE t SET v=1 WHERE id=1"],
    )
    .await;

    assert!(found.is_empty(), "unexpected mismatches: {found:?}");
    assert_eq!(
        summary,
        BatchSummary {
            executed: 2,
            skipped: 1,
            inconsistent: 0
        }
    );
}

#[tokio::test]
async fn test_row_order_only_matters_when_ordered() {
    // Tables without an integer key are scanned in insertion order.
    let setup_a = ["CREATE TABLE u (name TEXT)", "INSERT INTO u VALUES ('a'), ('b')"];
    let setup_b = ["CREATE TABLE u (name TEXT)", "INSERT INTO u VALUES ('b'), ('a')"];
    let statements = ["SELECT name FROM u ORDER BY name", "SELECT name FROM u"];

    let ordered = driver(seeded(&setup_a).await, seeded(&setup_b).await, CompareMode::Ordered);
    let (_, found) = collect(&ordered, &statements).await;
    assert_eq!(found, vec![(1, Divergence::RowContent { row: 0 })]);

    let unordered = driver(
        seeded(&setup_a).await,
        seeded(&setup_b).await,
        CompareMode::Unordered,
    );
    let (summary, _) = collect(&unordered, &statements).await;
    assert!(summary.is_consistent());
}

#[tokio::test]
async fn test_differing_data_is_reported() {
    let a = seeded(&[SCHEMA, "INSERT INTO t (id, v) VALUES (1, 10), (2, 20)"]).await;
    let b = seeded(&[SCHEMA, "INSERT INTO t (id, v) VALUES (1, 10), (2, NULL)"]).await;

    let batch = driver(a, b, CompareMode::Ordered);
    let (summary, found) = collect(
        &batch,
        &[
            "SELECT id, v FROM t ORDER BY id",
            "UPDATE t SET v = 0 WHERE v IS NOT NULL",
        ],
    )
    .await;

    assert_eq!(summary.inconsistent, 2);
    assert_eq!(
        found,
        vec![
            (0, Divergence::RowContent { row: 1 }),
            (1, Divergence::AffectedRows { a: 2, b: 1 }),
        ]
    );
}

#[tokio::test]
async fn test_missing_table_on_one_side() {
    let a = seeded(&[SCHEMA]).await;
    let b = seeded(&[]).await;

    let batch = driver(a, b, CompareMode::Ordered);
    let (_, found) = collect(&batch, &["SELECT id FROM t", "SELECT id FROM nowhere"]).await;

    // Both sides fail the second statement, which counts as agreement.
    assert_eq!(
        found,
        vec![(
            0,
            Divergence::FailurePresence {
                a_failed: false,
                b_failed: true
            }
        )]
    );
}

#[tokio::test]
async fn test_strict_policy_accepts_identical_failures() {
    let a = seeded(&[SCHEMA]).await;
    let b = seeded(&["CREATE TABLE t (id INTEGER PRIMARY KEY)"]).await;

    let batch = BatchDriver::new(
        DualRunner::new(a, b),
        Comparator::new(CompareMode::Ordered, FailurePolicy::Strict),
    );
    let (_, found) = collect(
        &batch,
        &["SELECT missing_column FROM t", "SELECT * FROM nowhere"],
    )
    .await;

    assert!(found.is_empty(), "unexpected mismatches: {found:?}");
}

#[tokio::test]
async fn test_same_handle_on_both_sides_is_consistent() {
    let shared = seeded(&[
        SCHEMA,
        "INSERT INTO t (id, v, name) VALUES (1, 1, 'tab\there'), (2, NULL, x'00ff')",
    ])
    .await;

    let batch = driver(Arc::clone(&shared), shared, CompareMode::Ordered);
    let (summary, found) = collect(
        &batch,
        &[
            "SELECT * FROM t ORDER BY id",
            "SELECT * FROM t WHERE id > 100",
            "SELECT count(*), sum(v), avg(v) FROM t",
        ],
    )
    .await;

    assert!(found.is_empty(), "unexpected mismatches: {found:?}");
    assert_eq!(summary.executed, 3);
}

#[tokio::test]
async fn test_capacity_failure_on_one_side() {
    let a = SqliteClient::connect(
        "sqlite::memory:",
        &ClientOptions {
            max_rows: Some(1),
            ..ClientOptions::default()
        },
    )
    .await
    .unwrap();
    let b = seeded(&[]).await;

    let batch = driver(Arc::new(a), b, CompareMode::Ordered);
    let (_, found) = collect(&batch, &["SELECT 1 UNION ALL SELECT 2"]).await;

    assert_eq!(
        found,
        vec![(
            0,
            Divergence::FailurePresence {
                a_failed: true,
                b_failed: false
            }
        )]
    );
}

#[tokio::test]
async fn test_text_report_for_inconsistency() {
    let a = seeded(&[SCHEMA, "INSERT INTO t (id, name) VALUES (1, 'x')"]).await;
    let b = seeded(&[SCHEMA, "INSERT INTO t (id, name) VALUES (1, 'y')"]).await;

    let batch = driver(a, b, CompareMode::Ordered);
    let mut reporter = TextReporter::new(Vec::new());
    let summary = batch
        .run(&["SELECT id, name FROM t"], &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.inconsistent, 1);
    let report = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(report.contains("[source A]\nid\tname\n1\tx\n"));
    assert!(report.contains("[source B]\nid\tname\n1\ty\n"));
}
