/// Result type alias for rowmap operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types for statement execution and row decoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations (connectivity, constraint violations, SQL syntax).
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// A row (or single value) could not be decoded into the requested type.
   #[error("row cannot be decoded into the target type: {0}")]
   Decode(#[source] serde_json::Error),

   /// SQL referenced a named parameter that has no bound value.
   #[error("no value bound for parameter `:{0}`")]
   MissingParameter(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Decode(_) => "DECODE_ERROR".to_string(),
         Error::MissingParameter(_) => "MISSING_PARAMETER".to_string(),
      }
   }
}

/// Failure modes for [`query_only`](crate::Database::query_only).
///
/// Exactly two variants so callers can tell "the fetch itself failed" apart
/// from "the fetch worked but did not produce exactly one row". Neither
/// variant carries a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryOnlyError {
   /// The underlying fetch failed before the row count could be determined.
   #[error("query failed before the row count could be determined")]
   Connection,

   /// The query returned zero rows or more than one row.
   #[error("query did not return exactly one row")]
   RowCount,
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_missing_parameter() {
      let err = Error::MissingParameter("user_id".into());
      assert_eq!(err.error_code(), "MISSING_PARAMETER");
      assert!(err.to_string().contains(":user_id"));
   }

   #[test]
   fn test_error_code_decode() {
      let json_err = serde_json::from_str::<i64>("\"abc\"").unwrap_err();
      let err = Error::Decode(json_err);
      assert_eq!(err.error_code(), "DECODE_ERROR");
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }

   #[test]
   fn test_query_only_variants_distinguishable() {
      assert_ne!(QueryOnlyError::Connection, QueryOnlyError::RowCount);
      assert!(
         QueryOnlyError::RowCount
            .to_string()
            .contains("exactly one row")
      );
   }
}
