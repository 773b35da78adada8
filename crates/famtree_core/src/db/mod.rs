//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the family store.
//! - Apply schema migrations in deterministic order.
//! - Hold the process-wide shared connection.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write person data before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;
pub mod shared;

pub use open::{open_db, open_db_in_memory};
pub use shared::{shared_connection, SharedDb};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The shared connection is already bound to another database file.
    SharedPathConflict {
        active: PathBuf,
        requested: PathBuf,
    },
    /// A previous holder panicked while using the shared connection.
    SharedConnectionPoisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SharedPathConflict { active, requested } => write!(
                f,
                "shared connection already open at `{}`; refusing to switch to `{}`",
                active.display(),
                requested.display()
            ),
            Self::SharedConnectionPoisoned => write!(f, "shared connection lock is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::SharedPathConflict { .. } => None,
            Self::SharedConnectionPoisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
