use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::decode::{self, Row};
use crate::error::{Error, QueryOnlyError, Result};
use crate::exec;
use crate::params::Params;
use crate::transactions::Transaction;

/// Configuration for the connection pool behind a [`Database`].
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_rowmap::DatabaseConfig;
///
/// // Use defaults
/// let config = DatabaseConfig::default();
///
/// // Override just one field
/// let config = DatabaseConfig {
///     max_connections: 2,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
   /// Maximum number of pooled connections.
   ///
   /// Default: 5
   pub max_connections: u32,

   /// How long a statement waits on a locked database before failing
   /// (in seconds).
   ///
   /// Default: 5
   pub busy_timeout_secs: u64,

   /// Create the database file if it does not exist.
   ///
   /// Default: true
   pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
   fn default() -> Self {
      Self {
         max_connections: 5,
         busy_timeout_secs: 5,
         create_if_missing: true,
      }
   }
}

/// Main entry point: typed queries and statements over a pooled SQLite
/// database.
///
/// Every operation is a single request/response round trip that acquires a
/// pooled connection and releases it on every exit path, including failure.
/// Nothing is cached or retained between calls. For a set of statements that
/// must share one exclusive connection, use [`Database::begin`] or
/// [`Database::transaction`].
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use sqlx_sqlite_rowmap::{Database, params};
///
/// #[derive(Deserialize)]
/// struct User {
///     id: i64,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), sqlx_sqlite_rowmap::Error> {
/// let db = Database::connect(std::path::Path::new("app.db"), None).await?;
///
/// db.execute(
///     "UPDATE users SET email=:email WHERE id=:id",
///     params! { "id" => 0, "email" => "someone@example.com" },
/// )
/// .await?;
///
/// let users: Vec<User> = db.query("SELECT * FROM users", params!()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
   pool: SqlitePool,
}

impl Database {
   /// Connect to a SQLite database file.
   ///
   /// The file is created if missing (configurable) and the pool uses WAL
   /// journal mode. Pass `None` to use the [`DatabaseConfig`] defaults.
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<DatabaseConfig>,
   ) -> Result<Self> {
      let config = custom_config.unwrap_or_default();

      let options = SqliteConnectOptions::new()
         .filename(path.as_ref())
         .create_if_missing(config.create_if_missing)
         .journal_mode(SqliteJournalMode::Wal)
         .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
         .foreign_keys(true);

      let pool = SqlitePoolOptions::new()
         .max_connections(config.max_connections)
         .connect_with(options)
         .await?;

      Ok(Self { pool })
   }

   /// Connect to an in-memory SQLite database.
   ///
   /// The pool is pinned to a single connection so the database outlives
   /// individual operations (each in-memory connection is its own database).
   pub async fn connect_in_memory() -> Result<Self> {
      let options = SqliteConnectOptions::new().in_memory(true);

      let pool = SqlitePoolOptions::new()
         .min_connections(1)
         .max_connections(1)
         .idle_timeout(None)
         .max_lifetime(None)
         .connect_with(options)
         .await?;

      Ok(Self { pool })
   }

   /// The underlying connection pool, for operations this API does not cover.
   pub fn pool(&self) -> &SqlitePool {
      &self.pool
   }

   /// Close the pool and all of its connections.
   pub async fn close(&self) {
      self.pool.close().await;
   }

   /// Execute a single SQL statement.
   ///
   /// ```no_run
   /// # async fn example(db: &sqlx_sqlite_rowmap::Database) -> Result<(), sqlx_sqlite_rowmap::Error> {
   /// use sqlx_sqlite_rowmap::params;
   ///
   /// let changed = db.execute(
   ///     "UPDATE users SET email=:email WHERE id=:id",
   ///     params! { "id" => 0, "email" => "someone@example.com" },
   /// )
   /// .await?;
   /// # Ok(())
   /// # }
   /// ```
   ///
   /// Returns the number of affected rows.
   pub async fn execute(&self, sql: &str, params: Params) -> Result<u64> {
      exec::execute(&self.pool, sql, &params).await
   }

   /// Execute a statement and fetch the rows its `RETURNING` clause
   /// produces, as raw generated-key rows.
   ///
   /// SQLite reports generated keys through `RETURNING` (e.g.
   /// `INSERT INTO users (email) VALUES (:email) RETURNING id`); a statement
   /// without one yields no rows.
   pub async fn execute_returning_keys(&self, sql: &str, params: Params) -> Result<Vec<Row>> {
      exec::fetch_all_rows(&self.pool, sql, &params).await
   }

   /// Execute a statement and decode one named column from its single
   /// generated-key row.
   ///
   /// # Panics
   ///
   /// Panics when the statement does not produce exactly one generated-key
   /// row, when the named key is absent from that row, or when the key's
   /// value cannot be decoded as `T` — each with a distinct message, since
   /// these indicate a statement/schema mismatch.
   pub async fn execute_get_key<T: DeserializeOwned>(
      &self,
      sql: &str,
      key: &str,
      params: Params,
   ) -> Result<T> {
      let rows = exec::fetch_all_rows(&self.pool, sql, &params).await?;
      Ok(key_from_row(&only_generated_row(rows), key))
   }

   /// Execute a statement and decode one named column from every
   /// generated-key row.
   ///
   /// # Panics
   ///
   /// Panics when the named key is absent from a row or cannot be decoded
   /// as `T`.
   pub async fn execute_get_keys<T: DeserializeOwned>(
      &self,
      sql: &str,
      key: &str,
      params: Params,
   ) -> Result<Vec<T>> {
      let rows = exec::fetch_all_rows(&self.pool, sql, &params).await?;
      Ok(rows.iter().map(|row| key_from_row(row, key)).collect())
   }

   /// Fetch all results from a query and decode them into `T`.
   ///
   /// An empty result set is `Ok(vec![])`, not an error.
   ///
   /// ```no_run
   /// # use serde::Deserialize;
   /// # #[derive(Deserialize)]
   /// # struct User { email: String }
   /// # async fn example(db: &sqlx_sqlite_rowmap::Database) -> Result<(), sqlx_sqlite_rowmap::Error> {
   /// use sqlx_sqlite_rowmap::params;
   ///
   /// let users: Vec<User> = db.query(
   ///     "SELECT * FROM users WHERE email=:email",
   ///     params! { "email" => "someone@example.com" },
   /// )
   /// .await?;
   /// # Ok(())
   /// # }
   /// ```
   ///
   /// Always bind variable input through `params` — never interpolate it
   /// into the SQL string.
   ///
   /// # Panics
   ///
   /// Panics when a fetched row does not match the shape of `T`; a shape
   /// mismatch is a programming error, not a runtime condition. Use
   /// [`query_raw`](Database::query_raw) with
   /// [`decode::from_row`](crate::decode::from_row) to handle it as a
   /// `Result` instead.
   pub async fn query<T: DeserializeOwned>(&self, sql: &str, params: Params) -> Result<Vec<T>> {
      let rows = exec::fetch_all_rows(&self.pool, sql, &params).await?;
      Ok(rows.into_iter().map(decode_row).collect())
   }

   /// Fetch all results from a query as raw normalized rows.
   pub async fn query_raw(&self, sql: &str, params: Params) -> Result<Vec<Row>> {
      exec::fetch_all_rows(&self.pool, sql, &params).await
   }

   /// Fetch the first result from a query, decoded into `T`, or `None` when
   /// the query matches nothing. Remaining rows are never decoded.
   ///
   /// # Panics
   ///
   /// Panics when the first row does not match the shape of `T` (see
   /// [`query`](Database::query)).
   pub async fn query_first<T: DeserializeOwned>(
      &self,
      sql: &str,
      params: Params,
   ) -> Result<Option<T>> {
      let row = exec::fetch_first_row(&self.pool, sql, &params).await?;
      Ok(row.map(decode_row))
   }

   /// Fetch exactly one result from a query, decoded into `T`.
   ///
   /// Fails with [`QueryOnlyError::RowCount`] when the query matches zero
   /// rows or more than one, and [`QueryOnlyError::Connection`] when the
   /// fetch itself fails, so the two causes stay distinguishable. A missing
   /// named parameter also surfaces as `Connection` (and is logged at warn
   /// level): the error type deliberately has no third variant.
   ///
   /// # Panics
   ///
   /// Panics when the row does not match the shape of `T` (see
   /// [`query`](Database::query)).
   pub async fn query_only<T: DeserializeOwned>(
      &self,
      sql: &str,
      params: Params,
   ) -> Result<T, QueryOnlyError> {
      let row = exec::fetch_only_row(&self.pool, sql, &params).await?;
      Ok(decode_row(row))
   }

   /// Begin a transaction over one exclusive connection.
   ///
   /// The returned [`Transaction`] rolls back when dropped without an
   /// explicit [`commit`](Transaction::commit).
   pub async fn begin(&self) -> Result<Transaction> {
      Ok(Transaction::new(self.pool.begin().await?))
   }

   /// Run a unit of work inside a transaction.
   ///
   /// The transaction commits when the closure returns `Ok` and rolls back
   /// when it returns `Err`. The closure returns a boxed future because it
   /// borrows the transaction across await points.
   ///
   /// ```no_run
   /// # async fn example(db: &sqlx_sqlite_rowmap::Database) -> Result<(), sqlx_sqlite_rowmap::Error> {
   /// use sqlx_sqlite_rowmap::params;
   ///
   /// db.transaction(|tx| {
   ///     Box::pin(async move {
   ///         tx.execute("INSERT INTO users (email) VALUES (:e)", params! { "e" => "a@b.c" })
   ///             .await?;
   ///         tx.execute("DELETE FROM invites WHERE email=:e", params! { "e" => "a@b.c" })
   ///             .await?;
   ///         Ok(())
   ///     })
   /// })
   /// .await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn transaction<F, R>(&self, work: F) -> Result<R>
   where
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<R>>,
   {
      let mut tx = self.begin().await?;

      match work(&mut tx).await {
         Ok(value) => {
            tx.commit().await?;
            Ok(value)
         }
         Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
               tracing::error!(error = %rollback_err, "rollback failed after transaction error");
            }
            Err(e)
         }
      }
   }

   /// Execute a batch of statements atomically within one transaction.
   ///
   /// All statements either succeed together or fail together. Returns the
   /// affected-row count of each statement in order.
   pub async fn execute_transaction(
      &self,
      statements: Vec<(&str, Params)>,
   ) -> Result<Vec<u64>> {
      let mut tx = self.begin().await?;

      let exec_result = async {
         let mut counts = Vec::with_capacity(statements.len());
         for (sql, params) in statements {
            counts.push(tx.execute(sql, params).await?);
         }
         Ok::<Vec<u64>, Error>(counts)
      }
      .await;

      match exec_result {
         Ok(counts) => {
            tx.commit().await?;
            Ok(counts)
         }
         Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
               tracing::error!(error = %rollback_err, "rollback failed after batch statement error");
            }
            Err(e)
         }
      }
   }
}

/// Decode a row into `T`, treating a shape mismatch as fatal.
pub(crate) fn decode_row<T: DeserializeOwned>(row: Row) -> T {
   match decode::from_row(row) {
      Ok(value) => value,
      Err(e) => panic!(
         "row does not match target type {}: {e}",
         std::any::type_name::<T>()
      ),
   }
}

/// Reduce a generated-key result set to its single row, fatally on any other
/// arity.
pub(crate) fn only_generated_row(rows: Vec<Row>) -> Row {
   let count = rows.len();
   let mut rows = rows.into_iter();

   match (rows.next(), rows.next()) {
      (Some(row), None) => row,
      _ => panic!("expected exactly one generated-key row, got {count}"),
   }
}

/// Extract and decode one named key from a generated-key row, fatally on an
/// absent key or an unconvertible value.
pub(crate) fn key_from_row<T: DeserializeOwned>(row: &Row, key: &str) -> T {
   let value = match row.get(key) {
      Some(value) if !value.is_null() => value,
      _ => panic!("no generated key `{key}` in the returned row"),
   };

   match decode::from_single(value) {
      Ok(decoded) => decoded,
      Err(_) => panic!(
         "generated key `{key}` cannot be decoded as {}",
         std::any::type_name::<T>()
      ),
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::{Value as JsonValue, json};

   fn key_row(key: &str, value: JsonValue) -> Row {
      let mut row = Row::new();
      row.insert(key.to_string(), value);
      row
   }

   #[test]
   fn test_key_from_row_decodes_scalar() {
      let id: i64 = key_from_row(&key_row("id", json!(7)), "id");
      assert_eq!(id, 7);
   }

   #[test]
   #[should_panic(expected = "no generated key `missing`")]
   fn test_key_from_row_absent_key_is_fatal() {
      let _: i64 = key_from_row(&key_row("id", json!(7)), "missing");
   }

   #[test]
   #[should_panic(expected = "cannot be decoded as")]
   fn test_key_from_row_unconvertible_value_is_fatal() {
      // a bare number is not a valid serialized String
      let _: String = key_from_row(&key_row("id", json!(7)), "id");
   }

   #[test]
   #[should_panic(expected = "exactly one generated-key row, got 2")]
   fn test_only_generated_row_rejects_multiple() {
      only_generated_row(vec![key_row("id", json!(1)), key_row("id", json!(2))]);
   }

   #[test]
   #[should_panic(expected = "exactly one generated-key row, got 0")]
   fn test_only_generated_row_rejects_empty() {
      only_generated_row(Vec::new());
   }

   #[test]
   fn test_config_defaults() {
      let config = DatabaseConfig::default();
      assert_eq!(config.max_connections, 5);
      assert!(config.create_if_missing);
   }
}
