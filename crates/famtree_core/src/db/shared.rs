//! Process-wide shared connection.
//!
//! # Responsibility
//! - Open the person store once per process and hand out the same handle.
//! - Serialize access to the single underlying `Connection`.
//!
//! # Invariants
//! - Initialization is single-flight: concurrent first callers block on one
//!   initializer and observe the same handle.
//! - A failed initialization leaves the cell empty so a later call can retry.
//! - Requests for a different database path are rejected.

use super::{open_db, DbError, DbResult};
use log::info;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static SHARED_DB: OnceCell<SharedDb> = OnceCell::new();

/// Lazily opened, process-wide store handle.
pub struct SharedDb {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SharedDb {
    /// Database file backing this handle.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `f` while holding the connection lock.
    pub fn with_connection<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| DbError::SharedConnectionPoisoned)?;
        f(&guard)
    }
}

/// Returns the shared handle, opening `path` on first use.
///
/// # Errors
/// - Propagates open/migration failures from the first initializer.
/// - Returns `DbError::SharedPathConflict` when already bound elsewhere.
pub fn shared_connection(path: impl AsRef<Path>) -> DbResult<&'static SharedDb> {
    let requested = path.as_ref().to_path_buf();

    let shared = SHARED_DB.get_or_try_init(|| -> DbResult<SharedDb> {
        let conn = open_db(&requested)?;
        info!(
            "event=shared_db_init module=db status=ok path={}",
            requested.display()
        );
        Ok(SharedDb {
            path: requested.clone(),
            conn: Mutex::new(conn),
        })
    })?;

    if shared.path != requested {
        return Err(DbError::SharedPathConflict {
            active: shared.path.clone(),
            requested,
        });
    }

    Ok(shared)
}
