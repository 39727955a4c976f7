#![cfg(feature = "sqlite")]

use std::sync::Arc;
use utx::error::{BoxError, DbError};
use utx::transaction::TransactionManager;
use utx::udbc::connection::Connection;
use utx::udbc::driver::Driver;
use utx::udbc::sqlite::pool::SqliteDriver;
use utx::udbc::value::{ToValue, Value};

/// Builds a shared-cache in-memory database so that every connection the
/// driver hands out sees the same data. The returned keep-alive connection
/// pins the database for the duration of the test.
async fn setup(db_name: &str) -> (Arc<SqliteDriver>, Arc<dyn Connection>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let url = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);
    let driver = Arc::new(SqliteDriver::new(url).name(db_name).build().unwrap());

    // Keep a connection open to ensure the memory DB persists
    let keep_alive = driver.acquire().await.unwrap();
    keep_alive
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)",
            &[],
        )
        .await
        .unwrap();

    (driver, keep_alive)
}

async fn user_names(driver: &Arc<SqliteDriver>) -> Vec<String> {
    let conn = driver.acquire().await.unwrap();
    let rows = conn
        .query("SELECT name FROM users ORDER BY name", &[])
        .await
        .unwrap();
    conn.close().await.unwrap();
    rows.into_iter()
        .map(|r| match r.get("name") {
            Some(Value::Str(s)) => s.clone(),
            other => panic!("unexpected name column: {other:?}"),
        })
        .collect()
}

// A single transactional scope inserting two rows commits both.
#[tokio::test(flavor = "current_thread")]
async fn test_transactional_scope_commits_all_rows() {
    let (driver, _keep_alive) = setup("scope_commit").await;
    let tx = TransactionManager::new(driver.clone());

    tx.in_transaction_without_result(|conn| async move {
        conn.execute(
            "INSERT INTO users (name) VALUES (?)",
            &["alice".to_value()],
        )
        .await?;
        conn.execute(
            "INSERT INTO users (name) VALUES (?)",
            &["bob".to_value()],
        )
        .await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(user_names(&driver).await, vec!["alice", "bob"]);
}

// A duplicate key inside the scope rolls back everything and the call
// surfaces a wrapped failure with the database error as its cause.
#[tokio::test(flavor = "current_thread")]
async fn test_transactional_scope_rolls_back_on_duplicate_key() {
    let (driver, _keep_alive) = setup("scope_rollback").await;
    let tx = TransactionManager::new(driver.clone());

    let err = tx
        .in_transaction_without_result(|conn| async move {
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["carol".to_value()],
            )
            .await?;
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["carol".to_value()],
            )
            .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    let DbError::Work { source } = err else {
        panic!("expected Work, got {err:?}");
    };
    let cause = source.downcast_ref::<DbError>().unwrap();
    assert!(cause.to_string().contains("UNIQUE"), "cause: {cause}");

    assert!(user_names(&driver).await.is_empty());
}

// The result-bearing scope returns the unit of work's value and its rows
// persist.
#[tokio::test(flavor = "current_thread")]
async fn test_transactional_scope_with_result() {
    let (driver, _keep_alive) = setup("scope_result").await;
    let tx = TransactionManager::new(driver.clone());

    let affected = tx
        .in_transaction(|conn| async move {
            let mut n = 0;
            n += conn
                .execute(
                    "INSERT INTO users (name) VALUES (?)",
                    &["dave".to_value()],
                )
                .await?;
            n += conn
                .execute(
                    "INSERT INTO users (name) VALUES (?)",
                    &["erin".to_value()],
                )
                .await?;
            Ok::<_, BoxError>(n)
        })
        .await
        .unwrap();

    assert_eq!(affected, 2);
    assert_eq!(user_names(&driver).await, vec!["dave", "erin"]);
}

// An inner scope failing with a duplicate key propagates through the outer
// scope and neither level's insert survives, because the failure reached the
// top before any commit ran.
#[tokio::test(flavor = "current_thread")]
async fn test_nested_failure_rolls_back_both_levels() {
    let (driver, _keep_alive) = setup("scope_nested_fail").await;
    let tx = Arc::new(TransactionManager::new(driver.clone()));

    let inner = tx.clone();
    let err = tx
        .in_transaction_without_result(|conn| async move {
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["frank".to_value()],
            )
            .await?;
            inner
                .in_transaction_without_result(|conn| async move {
                    conn.execute(
                        "INSERT INTO users (name) VALUES (?)",
                        &["frank".to_value()],
                    )
                    .await?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Work { .. }));
    assert!(user_names(&driver).await.is_empty());
}

// Flat commit/rollback across nesting levels: an inner scope's commit makes
// everything executed so far durable, including the outer scope's earlier
// insert, and a later failure in the outer scope only undoes work done after
// that commit. Intentional behavior, there are no savepoints between levels.
#[tokio::test(flavor = "current_thread")]
async fn test_flat_commit_survives_outer_rollback() {
    let (driver, _keep_alive) = setup("scope_flat").await;
    let tx = Arc::new(TransactionManager::new(driver.clone()));

    let inner = tx.clone();
    let err = tx
        .in_transaction_without_result(|conn| async move {
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["grace".to_value()],
            )
            .await?;
            inner
                .in_transaction_without_result(|conn| async move {
                    conn.execute(
                        "INSERT INTO users (name) VALUES (?)",
                        &["heidi".to_value()],
                    )
                    .await?;
                    Ok(())
                })
                .await?;
            // Runs after the inner commit; the rollback below undoes only this.
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["ivan".to_value()],
            )
            .await?;
            Err::<(), BoxError>("late failure".into())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Work { .. }));
    assert_eq!(user_names(&driver).await, vec!["grace", "heidi"]);
}

// Auto-commit scope: each statement commits on its own; a later failure does
// not undo an earlier statement.
#[tokio::test(flavor = "current_thread")]
async fn test_auto_commit_scope_keeps_earlier_statements() {
    let (driver, _keep_alive) = setup("scope_autocommit").await;
    let tx = TransactionManager::new(driver.clone());

    let err = tx
        .with_connection(|conn| async move {
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["judy".to_value()],
            )
            .await?;
            conn.execute(
                "INSERT INTO users (name) VALUES (?)",
                &["judy".to_value()],
            )
            .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Work { .. }));
    assert_eq!(user_names(&driver).await, vec!["judy"]);
}
