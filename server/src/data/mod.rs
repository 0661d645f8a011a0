//! Data storage layer
//!
//! All persistent state lives in a single embedded SQLite database:
//! - `sqlite` - Database service, schema, migrations and repositories
//! - `topics` - In-process stream topics for async webhook processing

pub mod sqlite;
pub mod topics;

pub use sqlite::{SqliteError, SqlitePool, SqliteService};
