//! Typed SQLite queries built on sqlx.
//!
//! This crate is a convenience layer over sqlx's SQLite driver for
//! application code that wants typed rows without raw driver calls. It
//! provides:
//!
//! - [`Database`] — main entry point over a pooled SQLite database
//! - Named `:param` binding via the [`params!`] macro
//! - Typed queries with explicit result arities ([`Database::query`],
//!   [`Database::query_first`], [`Database::query_only`])
//! - Statement execution with generated-key access ([`Database::execute`],
//!   [`Database::execute_returning_keys`], [`Database::execute_get_key`])
//! - Transactions with rollback-on-drop ([`Database::begin`],
//!   [`Database::transaction`])
//! - JSON type decoding for SQLite values ([`decode`])
//!
//! # Example
//!
//! ```no_run
//! use serde::Deserialize;
//! use sqlx_sqlite_rowmap::{Database, QueryOnlyError, params};
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: i64,
//!     email: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect(std::path::Path::new("app.db"), None).await?;
//!
//! // Write
//! let id: i64 = db.execute_get_key(
//!     "INSERT INTO users (email) VALUES (:email) RETURNING id",
//!     "id",
//!     params! { "email" => "someone@example.com" },
//! ).await?;
//!
//! // Read
//! let user: Option<User> = db.query_first(
//!     "SELECT * FROM users WHERE id=:id",
//!     params! { "id" => id },
//! ).await?;
//!
//! // Exactly-one discipline
//! match db.query_only::<User>("SELECT * FROM users WHERE id=:id", params! { "id" => id }).await {
//!     Ok(user) => println!("{}", user.email),
//!     Err(QueryOnlyError::RowCount) => println!("not exactly one row"),
//!     Err(QueryOnlyError::Connection) => println!("fetch failed"),
//! }
//!
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod params;
pub mod transactions;
pub mod wrapper;

mod exec;

pub use decode::{Row, from_row, from_single, row_to_map, to_json};
pub use error::{Error, QueryOnlyError, Result};
pub use params::{Params, bind_value};
pub use transactions::Transaction;
pub use wrapper::{Database, DatabaseConfig};

// Re-export commonly used types from dependencies; `json` also backs the
// `params!` macro expansion.
pub use serde_json::{Value as JsonValue, json};
