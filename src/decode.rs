use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value as JsonValue};
use sqlx::sqlite::{SqliteRow, SqliteTypeInfo, SqliteValue, SqliteValueRef};
use sqlx::{Column, Row as _, TypeInfo, Value, ValueRef};
use time::PrimitiveDateTime;

use crate::{Error, Result};

/// One database row: column name to normalized JSON value, in result order.
pub type Row = IndexMap<String, JsonValue>;

/// Convert a SQLite value to a JSON value.
///
/// Total conversion: every value maps to exactly one JSON value and the
/// function never fails.
///
/// `declared` is the column's type info, which carries the declared column
/// type (`BOOLEAN`, `DATETIME`, ...) where the value itself only carries its
/// storage class. Columns with no usable declared type (expression columns,
/// and declarations like `NUMERIC` or `DECIMAL(30,9)` that the driver does
/// not map) are normalized by storage class instead; text storage that forms
/// a valid JSON number is carried as an arbitrary-precision number with its
/// exact digit sequence, which is how SQLite stores NUMERIC values that do
/// not fit an i64 or f64 losslessly. BLOB values are returned as
/// base64-encoded strings since JSON has no native binary type.
pub fn to_json(value: SqliteValueRef, declared: &SqliteTypeInfo) -> JsonValue {
   if value.is_null() {
      return JsonValue::Null;
   }

   if declared.is_null() {
      return storage_to_json(&value.to_owned());
   }

   let type_name = declared.name().to_string();
   let value = value.to_owned();

   // Dispatch on the declared column type
   match type_name.as_str() {
      "TEXT" => value
         .try_decode::<String>()
         .map(JsonValue::String)
         .unwrap_or(JsonValue::Null),

      "INTEGER" => value
         .try_decode::<i64>()
         .map(|v| JsonValue::Number(v.into()))
         .unwrap_or(JsonValue::Null),

      "REAL" => value
         .try_decode::<f64>()
         .ok()
         .and_then(Number::from_f64)
         .map(JsonValue::Number)
         .unwrap_or(JsonValue::Null),

      // stored as INTEGER 0/1
      "BOOLEAN" => value
         .try_decode::<bool>()
         .map(JsonValue::Bool)
         .unwrap_or(JsonValue::Null),

      // SQLite stores dates and times as TEXT in ISO 8601 form
      "DATE" | "TIME" => text_fallback(&value),

      "DATETIME" => {
         if let Ok(dt) = value.try_decode::<PrimitiveDateTime>() {
            JsonValue::String(dt.to_string())
         } else {
            text_fallback(&value)
         }
      }

      "BLOB" => value
         .try_decode::<Vec<u8>>()
         .map(|blob| JsonValue::String(base64_encode(&blob)))
         .unwrap_or(JsonValue::Null),

      _ => storage_to_json(&value),
   }
}

/// Normalize a value by its storage class alone.
///
/// Used when the statement exposes no declared column type. Text that parses
/// as a JSON number becomes an arbitrary-precision number, so decimals kept
/// as TEXT by NUMERIC affinity surface with their digit sequence intact
/// rather than through a binary floating round-trip.
fn storage_to_json(value: &SqliteValue) -> JsonValue {
   match value.type_info().name() {
      "INTEGER" => value
         .try_decode::<i64>()
         .map(|v| JsonValue::Number(v.into()))
         .unwrap_or(JsonValue::Null),

      "REAL" => value
         .try_decode::<f64>()
         .ok()
         .and_then(Number::from_f64)
         .map(JsonValue::Number)
         .unwrap_or(JsonValue::Null),

      "BLOB" => value
         .try_decode::<Vec<u8>>()
         .map(|blob| JsonValue::String(base64_encode(&blob)))
         .unwrap_or(JsonValue::Null),

      "TEXT" => match value.try_decode::<String>() {
         Ok(text) => serde_json::from_str::<Number>(text.trim())
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::String(text)),
         Err(_) => JsonValue::Null,
      },

      _ => JsonValue::Null,
   }
}

/// Textual fallback for values whose type has no dedicated conversion.
///
/// Unchecked so SQLite's own storage-to-text conversion applies regardless
/// of the declared column type; only a value with no text form at all
/// becomes null.
fn text_fallback(value: &SqliteValue) -> JsonValue {
   value
      .try_decode_unchecked::<String>()
      .map(JsonValue::String)
      .unwrap_or(JsonValue::Null)
}

/// Convert a fetched row into a [`Row`], normalizing every column value.
///
/// Keys are the column names exactly as the statement produced them, in
/// result order.
pub fn row_to_map(row: &SqliteRow) -> Row {
   let mut map = Row::with_capacity(row.len());

   for column in row.columns() {
      let value = row
         .try_get_raw(column.ordinal())
         .map(|v| to_json(v, column.type_info()))
         .unwrap_or(JsonValue::Null);
      map.insert(column.name().to_string(), value);
   }

   map
}

/// Decode a normalized row into the target type `T`.
///
/// Column names must match field names exactly (case-sensitive, no
/// aliasing). Fails with [`Error::Decode`] when a required field has no
/// matching column or a column's value cannot be converted to the field's
/// declared type (e.g., an object where a scalar is expected).
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
   let object = JsonValue::Object(row.into_iter().collect());
   serde_json::from_value(object).map_err(Error::Decode)
}

/// Decode a single normalized value into the target type `T`.
///
/// The value's serialized string form is parsed directly as `T`, without
/// building an enclosing document. Known limitation: this path fails (or
/// loses precision) for target types whose string form is not their
/// canonical serialized form. A high-precision decimal stored as TEXT
/// surfaces as a JSON string here and will not parse as a numeric target.
pub fn from_single<T: DeserializeOwned>(value: &JsonValue) -> Result<T> {
   serde_json::from_str(&value.to_string()).map_err(Error::Decode)
}

/// Base64 encode binary data for JSON serialization.
fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}
