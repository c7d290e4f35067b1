//! Tests for transactional scopes: commit, rollback, and rollback-on-drop.

use serde::Deserialize;
use sqlx_sqlite_rowmap::{Database, Error, params};
use tempfile::TempDir;

#[derive(Debug, PartialEq, Deserialize)]
struct Account {
   id: i64,
   balance: i64,
}

async fn create_test_db() -> (Database, TempDir) {
   let temp_dir = TempDir::new().expect("Failed to create temp directory");
   let db_path = temp_dir.path().join("test.db");
   let db = Database::connect(&db_path, None)
      .await
      .expect("Failed to connect to test database");

   db.execute(
      "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, balance INTEGER NOT NULL)",
      params!(),
   )
   .await
   .unwrap();

   (db, temp_dir)
}

async fn count_accounts(db: &Database) -> i64 {
   let rows = db
      .query_raw("SELECT COUNT(*) AS n FROM accounts", params!())
      .await
      .unwrap();
   rows[0]["n"].as_i64().unwrap()
}

// ============================================================================
// explicit begin/commit/rollback
// ============================================================================

#[tokio::test]
async fn test_commit_persists_writes() {
   let (db, _temp) = create_test_db().await;

   let mut tx = db.begin().await.unwrap();
   tx.execute(
      "INSERT INTO accounts (balance) VALUES (:b)",
      params! { "b" => 100 },
   )
   .await
   .unwrap();
   tx.commit().await.unwrap();

   assert_eq!(count_accounts(&db).await, 1);
}

#[tokio::test]
async fn test_rollback_discards_writes() {
   let (db, _temp) = create_test_db().await;

   let mut tx = db.begin().await.unwrap();
   tx.execute(
      "INSERT INTO accounts (balance) VALUES (:b)",
      params! { "b" => 100 },
   )
   .await
   .unwrap();
   tx.rollback().await.unwrap();

   assert_eq!(count_accounts(&db).await, 0);
}

#[tokio::test]
async fn test_drop_without_commit_rolls_back() {
   let (db, _temp) = create_test_db().await;

   let mut tx = db.begin().await.unwrap();
   tx.execute(
      "INSERT INTO accounts (balance) VALUES (:b)",
      params! { "b" => 100 },
   )
   .await
   .unwrap();
   drop(tx);

   assert_eq!(count_accounts(&db).await, 0);
}

#[tokio::test]
async fn test_reads_inside_transaction_see_uncommitted_writes() {
   let (db, _temp) = create_test_db().await;

   let mut tx = db.begin().await.unwrap();
   tx.execute(
      "INSERT INTO accounts (balance) VALUES (:b)",
      params! { "b" => 42 },
   )
   .await
   .unwrap();

   let accounts: Vec<Account> = tx.query("SELECT * FROM accounts", params!()).await.unwrap();
   assert_eq!(accounts.len(), 1);
   assert_eq!(accounts[0].balance, 42);

   let first: Option<Account> = tx
      .query_first("SELECT * FROM accounts", params!())
      .await
      .unwrap();
   assert!(first.is_some());

   let only: Account = tx
      .query_only("SELECT * FROM accounts", params!())
      .await
      .unwrap();
   assert_eq!(only.balance, 42);

   tx.rollback().await.unwrap();
   assert_eq!(count_accounts(&db).await, 0);
}

#[tokio::test]
async fn test_generated_keys_inside_transaction() {
   let (db, _temp) = create_test_db().await;

   let mut tx = db.begin().await.unwrap();
   let id: i64 = tx
      .execute_get_key(
         "INSERT INTO accounts (balance) VALUES (:b) RETURNING id",
         "id",
         params! { "b" => 1 },
      )
      .await
      .unwrap();
   tx.commit().await.unwrap();

   assert_eq!(id, 1);
}

// ============================================================================
// closure-based transaction
// ============================================================================

#[tokio::test]
async fn test_transaction_commits_on_ok() {
   let (db, _temp) = create_test_db().await;

   let inserted: u64 = db
      .transaction(|tx| {
         Box::pin(async move {
            let a = tx
               .execute(
                  "INSERT INTO accounts (balance) VALUES (:b)",
                  params! { "b" => 10 },
               )
               .await?;
            let b = tx
               .execute(
                  "INSERT INTO accounts (balance) VALUES (:b)",
                  params! { "b" => 20 },
               )
               .await?;
            Ok(a + b)
         })
      })
      .await
      .unwrap();

   assert_eq!(inserted, 2);
   assert_eq!(count_accounts(&db).await, 2);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_err() {
   let (db, _temp) = create_test_db().await;

   let result: Result<(), Error> = db
      .transaction(|tx| {
         Box::pin(async move {
            tx.execute(
               "INSERT INTO accounts (balance) VALUES (:b)",
               params! { "b" => 10 },
            )
            .await?;
            // references a parameter with no bound value
            tx.execute("INSERT INTO accounts (balance) VALUES (:missing)", params!())
               .await?;
            Ok(())
         })
      })
      .await;

   assert!(matches!(result, Err(Error::MissingParameter(_))));
   assert_eq!(count_accounts(&db).await, 0);
}

// ============================================================================
// batch execute_transaction
// ============================================================================

#[tokio::test]
async fn test_execute_transaction_all_or_nothing_success() {
   let (db, _temp) = create_test_db().await;

   let counts = db
      .execute_transaction(vec![
         (
            "INSERT INTO accounts (balance) VALUES (:b)",
            params! { "b" => 1 },
         ),
         (
            "INSERT INTO accounts (balance) VALUES (:b)",
            params! { "b" => 2 },
         ),
      ])
      .await
      .unwrap();

   assert_eq!(counts, vec![1, 1]);
   assert_eq!(count_accounts(&db).await, 2);
}

#[tokio::test]
async fn test_execute_transaction_all_or_nothing_failure() {
   let (db, _temp) = create_test_db().await;

   let result = db
      .execute_transaction(vec![
         (
            "INSERT INTO accounts (balance) VALUES (:b)",
            params! { "b" => 1 },
         ),
         ("INSERT INTO no_such_table (x) VALUES (1)", params!()),
      ])
      .await;

   assert!(result.is_err());
   assert_eq!(count_accounts(&db).await, 0);
}
