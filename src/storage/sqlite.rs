//! SQLite database layer

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use crate::error::Result;
use crate::storage::migrations;

/// Default wait for a competing writer before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Shared handle to the paperflow datastore.
///
/// The connection sits behind a mutex so one handle can be used from several
/// threads; separate handles on the same file serialize through SQLite's
/// write lock.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    schema_version: u32,
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&mut conn)?;

        tracing::debug!(path = %path.display(), schema_version, "opened database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            schema_version,
        })
    }

    /// Private in-memory database (no WAL, single handle).
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let schema_version = migrations::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            schema_version,
        })
    }

    /// Lock the connection for direct use.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}
