use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

use crate::{Error, Result};

/// Named statement parameters: parameter name to JSON value.
///
/// Referenced in SQL as `:name`. Build literally with the
/// [`params!`](crate::params!) macro.
pub type Params = IndexMap<String, JsonValue>;

/// Build a [`Params`] map from `"name" => value` pairs.
///
/// Values go through [`serde_json::json!`], so anything that macro accepts
/// works here.
///
/// ```
/// use sqlx_sqlite_rowmap::params;
///
/// let params = params! { "id" => 3, "email" => "someone@example.com" };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
   () => { $crate::Params::new() };
   ($($name:literal => $value:expr),+ $(,)?) => {{
      let mut map = $crate::Params::new();
      $( map.insert($name.to_string(), $crate::json!($value)); )+
      map
   }};
}

/// Rewrite `:name` placeholders to positional `?` binds.
///
/// Returns the rewritten SQL and the bind values in occurrence order. Each
/// occurrence of a name binds its value again, so a name may repeat. String
/// literals, quoted identifiers (`"x"`, `` `x` ``, `[x]`), comments, and
/// `::` are left untouched. A referenced name with no bound value is
/// [`Error::MissingParameter`]; entries the SQL never references are
/// ignored.
pub(crate) fn expand(sql: &str, params: &Params) -> Result<(String, Vec<JsonValue>)> {
   let mut out = String::with_capacity(sql.len());
   let mut values = Vec::new();
   let mut chars = sql.chars().peekable();

   while let Some(ch) = chars.next() {
      match ch {
         '\'' | '"' | '`' => {
            out.push(ch);
            copy_quoted(ch, &mut chars, &mut out);
         }

         // bracket-quoted identifier, ends at the first `]` with no escapes
         '[' => {
            out.push(ch);
            for c in chars.by_ref() {
               out.push(c);
               if c == ']' {
                  break;
               }
            }
         }

         '-' if chars.peek() == Some(&'-') => {
            out.push(ch);
            for c in chars.by_ref() {
               out.push(c);
               if c == '\n' {
                  break;
               }
            }
         }

         '/' if chars.peek() == Some(&'*') => {
            out.push(ch);
            if let Some(star) = chars.next() {
               out.push(star);
            }
            let mut prev = '\0';
            for c in chars.by_ref() {
               out.push(c);
               if prev == '*' && c == '/' {
                  break;
               }
               prev = c;
            }
         }

         ':' => {
            if chars.peek() == Some(&':') {
               // cast syntax, not a parameter
               out.push_str("::");
               chars.next();
            } else if chars.peek().is_some_and(|c| is_name_char(*c)) {
               let mut name = String::new();
               while let Some(&c) = chars.peek() {
                  if !is_name_char(c) {
                     break;
                  }
                  name.push(c);
                  chars.next();
               }

               let value = params.get(&name).ok_or(Error::MissingParameter(name))?;
               values.push(value.clone());
               out.push('?');
            } else {
               out.push(':');
            }
         }

         _ => out.push(ch),
      }
   }

   Ok((out, values))
}

fn is_name_char(c: char) -> bool {
   c.is_alphanumeric() || c == '_'
}

/// Copy a quoted region verbatim. SQL escapes a quote inside a quoted region
/// by doubling it, so `''` does not end the region.
fn copy_quoted(
   quote: char,
   chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
   out: &mut String,
) {
   while let Some(c) = chars.next() {
      out.push(c);
      if c == quote {
         if chars.peek() == Some(&quote) {
            out.push(quote);
            chars.next();
         } else {
            break;
         }
      }
   }
}

/// Bind a JSON value to a SQLx query.
///
/// Scalars bind as their native SQLite types; integers stay integers
/// whenever they fit in an i64. Arrays and objects bind as JSON text.
pub fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: JsonValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(n) => {
         if let Some(int_val) = n.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = n.as_u64() {
            // u64 beyond i64::MAX does not fit SQLite's INTEGER; f64 loses
            // precision but is the closest representable form
            query.bind(uint_val as f64)
         } else {
            query.bind(n.as_f64().unwrap_or_default())
         }
      }
      value => query.bind(value),
   }
}
