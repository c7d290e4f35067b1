use serde::de::DeserializeOwned;
use sqlx::Sqlite;

use crate::decode::Row;
use crate::error::{QueryOnlyError, Result};
use crate::exec;
use crate::params::Params;
use crate::wrapper::{decode_row, key_from_row, only_generated_row};

/// A set of statements serialized over one exclusive connection.
///
/// Created by [`Database::begin`](crate::Database::begin). Mirrors the
/// [`Database`](crate::Database) operations, but every statement runs inside
/// the same transaction. Consuming the value with [`commit`](Self::commit)
/// makes the changes permanent; [`rollback`](Self::rollback), or dropping
/// the value without committing, discards them, so the connection is
/// released on every exit path.
#[must_use = "if unused, the transaction is immediately rolled back"]
pub struct Transaction {
   inner: sqlx::Transaction<'static, Sqlite>,
}

impl Transaction {
   pub(crate) fn new(inner: sqlx::Transaction<'static, Sqlite>) -> Self {
      Self { inner }
   }

   /// Execute a single SQL statement inside this transaction.
   ///
   /// Returns the number of affected rows.
   pub async fn execute(&mut self, sql: &str, params: Params) -> Result<u64> {
      exec::execute(&mut *self.inner, sql, &params).await
   }

   /// Execute a statement and fetch its `RETURNING` rows as raw
   /// generated-key rows.
   pub async fn execute_returning_keys(&mut self, sql: &str, params: Params) -> Result<Vec<Row>> {
      exec::fetch_all_rows(&mut *self.inner, sql, &params).await
   }

   /// Execute a statement and decode one named column from its single
   /// generated-key row.
   ///
   /// # Panics
   ///
   /// Same fatal conditions as
   /// [`Database::execute_get_key`](crate::Database::execute_get_key).
   pub async fn execute_get_key<T: DeserializeOwned>(
      &mut self,
      sql: &str,
      key: &str,
      params: Params,
   ) -> Result<T> {
      let rows = exec::fetch_all_rows(&mut *self.inner, sql, &params).await?;
      Ok(key_from_row(&only_generated_row(rows), key))
   }

   /// Fetch all results from a query and decode them into `T`.
   ///
   /// # Panics
   ///
   /// Panics when a fetched row does not match the shape of `T` (see
   /// [`Database::query`](crate::Database::query)).
   pub async fn query<T: DeserializeOwned>(&mut self, sql: &str, params: Params) -> Result<Vec<T>> {
      let rows = exec::fetch_all_rows(&mut *self.inner, sql, &params).await?;
      Ok(rows.into_iter().map(decode_row).collect())
   }

   /// Fetch all results from a query as raw normalized rows.
   pub async fn query_raw(&mut self, sql: &str, params: Params) -> Result<Vec<Row>> {
      exec::fetch_all_rows(&mut *self.inner, sql, &params).await
   }

   /// Fetch the first result, decoded into `T`, or `None`. Remaining rows
   /// are never decoded.
   ///
   /// # Panics
   ///
   /// Panics when the first row does not match the shape of `T`.
   pub async fn query_first<T: DeserializeOwned>(
      &mut self,
      sql: &str,
      params: Params,
   ) -> Result<Option<T>> {
      let row = exec::fetch_first_row(&mut *self.inner, sql, &params).await?;
      Ok(row.map(decode_row))
   }

   /// Fetch exactly one result, decoded into `T`.
   ///
   /// Same arity and error semantics as
   /// [`Database::query_only`](crate::Database::query_only), including the
   /// mapping of missing parameters to `Connection`.
   ///
   /// # Panics
   ///
   /// Panics when the row does not match the shape of `T`.
   pub async fn query_only<T: DeserializeOwned>(
      &mut self,
      sql: &str,
      params: Params,
   ) -> Result<T, QueryOnlyError> {
      let row = exec::fetch_only_row(&mut *self.inner, sql, &params).await?;
      Ok(decode_row(row))
   }

   /// Commit this transaction, making all changes permanent.
   pub async fn commit(self) -> Result<()> {
      self.inner.commit().await?;
      Ok(())
   }

   /// Roll back this transaction, discarding all changes.
   pub async fn rollback(self) -> Result<()> {
      self.inner.rollback().await?;
      Ok(())
   }
}
