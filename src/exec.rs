//! Executor-generic statement operations shared by [`Database`](crate::Database)
//! and [`Transaction`](crate::Transaction).

use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Executor, Sqlite};
use tracing::{debug, warn};

use crate::decode::{self, Row};
use crate::error::{QueryOnlyError, Result};
use crate::params::{self, Params};

fn build<'a>(sql: &'a str, values: Vec<JsonValue>) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   let mut query = sqlx::query(sql);
   for value in values {
      query = params::bind_value(query, value);
   }
   query
}

/// Run a non-query statement and report the affected-row count.
pub(crate) async fn execute<'c, E>(executor: E, sql: &str, params: &Params) -> Result<u64>
where
   E: Executor<'c, Database = Sqlite>,
{
   let (expanded, values) = params::expand(sql, params)?;
   debug!(sql = %expanded, "executing statement");

   let result = build(&expanded, values).execute(executor).await?;
   Ok(result.rows_affected())
}

/// Fetch every result row, normalized, in fetch order.
pub(crate) async fn fetch_all_rows<'c, E>(executor: E, sql: &str, params: &Params) -> Result<Vec<Row>>
where
   E: Executor<'c, Database = Sqlite>,
{
   let (expanded, values) = params::expand(sql, params)?;
   debug!(sql = %expanded, "fetching rows");

   let rows = build(&expanded, values).fetch_all(executor).await?;
   Ok(rows.iter().map(decode::row_to_map).collect())
}

/// Fetch the first result row, if any. Rows past the first are never
/// materialized.
pub(crate) async fn fetch_first_row<'c, E>(
   executor: E,
   sql: &str,
   params: &Params,
) -> Result<Option<Row>>
where
   E: Executor<'c, Database = Sqlite>,
{
   let (expanded, values) = params::expand(sql, params)?;
   debug!(sql = %expanded, "fetching first row");

   let row = build(&expanded, values).fetch_optional(executor).await?;
   Ok(row.as_ref().map(decode::row_to_map))
}

/// Fetch exactly one result row.
///
/// Streams the result and stops after the second row, so arity is decided
/// without materializing the full result set. Zero rows and two-or-more rows
/// are both `RowCount`; any driver failure is `Connection`.
pub(crate) async fn fetch_only_row<'c, E>(
   executor: E,
   sql: &str,
   params: &Params,
) -> Result<Row, QueryOnlyError>
where
   E: Executor<'c, Database = Sqlite>,
{
   // A missing parameter also lands here: the two-variant error type has no
   // room for it, so it surfaces as Connection. Logged loudly since it is a
   // caller bug, not a connectivity problem.
   let (expanded, values) = params::expand(sql, params).map_err(|e| {
      warn!(error = %e, "parameter expansion failed");
      QueryOnlyError::Connection
   })?;
   debug!(sql = %expanded, "fetching exactly one row");

   let mut stream = build(&expanded, values).fetch(executor);

   let first = match stream.try_next().await {
      Ok(Some(row)) => row,
      Ok(None) => return Err(QueryOnlyError::RowCount),
      Err(e) => {
         debug!(error = %e, "fetch failed");
         return Err(QueryOnlyError::Connection);
      }
   };

   match stream.try_next().await {
      Ok(None) => Ok(decode::row_to_map(&first)),
      Ok(Some(_)) => Err(QueryOnlyError::RowCount),
      Err(e) => {
         debug!(error = %e, "fetch failed after first row");
         Err(QueryOnlyError::Connection)
      }
   }
}
